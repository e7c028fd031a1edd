//! BLE advertising payload encoder.
//!
//! Advertising payloads are repeated records of the form:
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────────────┐
//! │ Len (N + 1)  │ AD type  │ N bytes of value     │
//! │ (1B)         │ (1B)     │                      │
//! └──────────────┴──────────┴──────────────────────┘
//! ```
//!
//! The encoder never checks the 31-byte legacy limit or duplicate types;
//! an oversized payload is rejected later by the radio when advertising
//! starts.  [`PeripheralConfig::validate`](crate::config::PeripheralConfig::validate)
//! catches the common case (a device name that is too long) up front.

/// Legacy (BLE 4.x) advertising PDU payload limit.
pub const MAX_LEGACY_ADV_LEN: usize = 31;

/// LE General Discoverable, BR/EDR not supported.
pub const FLAGS_GENERAL_DISC_NO_BREDR: u8 = 0x06;

/// org.bluetooth.characteristic.gap.appearance: generic computer.
pub const APPEARANCE_GENERIC_COMPUTER: u16 = 128;

/// Assigned AD type codes used by this firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdvType {
    Flags = 0x01,
    Uuid16More = 0x02,
    Uuid16Complete = 0x03,
    Uuid32More = 0x04,
    Uuid32Complete = 0x05,
    Uuid128More = 0x06,
    Uuid128Complete = 0x07,
    CompleteName = 0x09,
    Appearance = 0x19,
}

impl From<AdvType> for u8 {
    fn from(t: AdvType) -> u8 {
        t as u8
    }
}

/// A Bluetooth UUID in one of the three advertisable widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uuid {
    U16(u16),
    U32(u32),
    U128(u128),
}

impl Uuid {
    /// Little-endian wire form.
    pub fn to_le_bytes(self) -> Vec<u8> {
        match self {
            Self::U16(v) => v.to_le_bytes().to_vec(),
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::U128(v) => v.to_le_bytes().to_vec(),
        }
    }

    fn complete_list_type(self) -> AdvType {
        match self {
            Self::U16(_) => AdvType::Uuid16Complete,
            Self::U32(_) => AdvType::Uuid32Complete,
            Self::U128(_) => AdvType::Uuid128Complete,
        }
    }
}

/// One `(type, value)` record, in caller order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvField {
    pub ad_type: u8,
    pub value: Vec<u8>,
}

impl AdvField {
    pub fn new(ad_type: impl Into<u8>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            ad_type: ad_type.into(),
            value: value.into(),
        }
    }
}

/// Encoded advertising data, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdvertisingPayload(Vec<u8>);

impl AdvertisingPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the payload fits a legacy advertising PDU.
    pub fn fits_legacy(&self) -> bool {
        self.0.len() <= MAX_LEGACY_ADV_LEN
    }
}

impl AsRef<[u8]> for AdvertisingPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Longest value one record can carry: the length byte also counts the type.
pub const MAX_FIELD_VALUE_LEN: usize = 254;

/// Encode a single record.
///
/// `value` must be at most [`MAX_FIELD_VALUE_LEN`] bytes.  Debug builds
/// panic on longer values; release builds wrap the length byte.
pub fn encode_field(ad_type: u8, value: &[u8], out: &mut Vec<u8>) {
    debug_assert!(
        value.len() <= MAX_FIELD_VALUE_LEN,
        "AD value of {} bytes does not fit a length byte",
        value.len()
    );
    out.push((value.len() + 1) as u8);
    out.push(ad_type);
    out.extend_from_slice(value);
}

/// Concatenate `fields` as length-prefixed records.
///
/// Each value must fit [`MAX_FIELD_VALUE_LEN`]; see [`encode_field`].
pub fn encode(fields: &[AdvField]) -> AdvertisingPayload {
    let total = fields.iter().map(|f| f.value.len() + 2).sum();
    let mut out = Vec::with_capacity(total);
    for f in fields {
        encode_field(f.ad_type, &f.value, &mut out);
    }
    AdvertisingPayload(out)
}

/// Standard peripheral payload: flags, name, service UUIDs, appearance.
///
/// `appearance == 0` omits the appearance record.  Each UUID becomes its
/// own complete-list record of the matching width.
pub fn advertising_payload(name: Option<&str>, services: &[Uuid], appearance: u16) -> AdvertisingPayload {
    let mut fields = Vec::with_capacity(3 + services.len());
    fields.push(AdvField::new(AdvType::Flags, [FLAGS_GENERAL_DISC_NO_BREDR]));

    if let Some(name) = name {
        fields.push(AdvField::new(AdvType::CompleteName, name.as_bytes()));
    }

    for uuid in services {
        fields.push(AdvField::new(uuid.complete_list_type(), uuid.to_le_bytes()));
    }

    if appearance != 0 {
        fields.push(AdvField::new(AdvType::Appearance, appearance.to_le_bytes()));
    }

    encode(&fields)
}

// ───────────────────────────────────────────────────────────────
// Decoding (diagnostics)
// ───────────────────────────────────────────────────────────────

/// Iterator over `(ad_type, value)` records.  Stops at the first zero-length
/// or truncated record.
pub struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Fields<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.data.get(self.pos)? as usize;
        if len == 0 || self.pos + len >= self.data.len() {
            self.pos = self.data.len();
            return None;
        }
        let ad_type = self.data[self.pos + 1];
        let value = &self.data[self.pos + 2..self.pos + 1 + len];
        self.pos += len + 1;
        Some((ad_type, value))
    }
}

pub fn decode_fields(payload: &[u8]) -> Fields<'_> {
    Fields { data: payload, pos: 0 }
}

/// First complete-name record, if any.
pub fn decode_name(payload: &[u8]) -> Option<String> {
    decode_fields(payload)
        .find(|(t, _)| *t == AdvType::CompleteName as u8)
        .map(|(_, v)| String::from_utf8_lossy(v).into_owned())
}

/// All UUIDs from complete 16/32/128-bit list records.
pub fn decode_services(payload: &[u8]) -> Vec<Uuid> {
    let mut out = Vec::new();
    for (t, v) in decode_fields(payload) {
        if t == AdvType::Uuid16Complete as u8 {
            out.extend(
                v.chunks_exact(2)
                    .map(|c| Uuid::U16(u16::from_le_bytes([c[0], c[1]]))),
            );
        } else if t == AdvType::Uuid32Complete as u8 {
            out.extend(
                v.chunks_exact(4)
                    .map(|c| Uuid::U32(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))),
            );
        } else if t == AdvType::Uuid128Complete as u8 {
            out.extend(v.chunks_exact(16).map(|c| {
                let mut b = [0u8; 16];
                b.copy_from_slice(c);
                Uuid::U128(u128::from_le_bytes(b))
            }));
        }
    }
    out
}

// ── Tests ────────────────────────────────────────────────────
