use heapless::Vec;

use crate::ble::adv_builder::MAX_SERVICE_UUIDS;
use crate::ble::ad_type;

/// Iterate over the well-formed AD structures as `(type, data)` pairs.
/// Parsing stops at the first zero-length or truncated structure.
pub fn ad_structures(data: &[u8]) -> AdStructures<'_> {
    AdStructures { data, pos: 0 }
}

pub struct AdStructures<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.pos;
        if i >= self.data.len() {
            return None;
        }
        let len = self.data[i] as usize;
        if len == 0 || i + len >= self.data.len() {
            self.pos = self.data.len();
            return None;
        }
        let ad_type = self.data[i + 1];
        let body = &self.data[i + 2..i + 1 + len];
        self.pos = i + len + 1;
        Some((ad_type, body))
    }
}

/// Flags octet of the advertisement, if any.
pub fn extract_flags(data: &[u8]) -> Option<u8> {
    ad_structures(data)
        .find(|(t, body)| *t == ad_type::FLAGS && !body.is_empty())
        .map(|(_, body)| body[0])
}

/// Collect every 16-bit service UUID (complete or incomplete lists).
pub fn service_uuids_16(data: &[u8]) -> Vec<u16, MAX_SERVICE_UUIDS> {
    let mut uuids = Vec::new();
    for (t, body) in ad_structures(data) {
        if t == ad_type::INCOMPLETE_16BIT_UUIDS || t == ad_type::COMPLETE_16BIT_UUIDS {
            for chunk in body.chunks_exact(2) {
                if uuids.push(u16::from_le_bytes([chunk[0], chunk[1]])).is_err() {
                    return uuids;
                }
            }
        }
    }
    uuids
}

/// Complete/shortened local name, if present and valid UTF-8.
pub fn local_name(data: &[u8]) -> Option<&str> {
    ad_structures(data)
        .find(|(t, _)| *t == ad_type::COMPLETE_LOCAL_NAME || *t == ad_type::SHORTENED_LOCAL_NAME)
        .and_then(|(_, body)| core::str::from_utf8(body).ok())
}
