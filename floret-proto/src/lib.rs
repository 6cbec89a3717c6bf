//! Floret wire protocol - credential payload format and BLE packet framing

pub mod ble;

use data_encoding::HEXLOWER;

/// Errors from building a credential payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("SSID cannot be empty")]
    EmptySsid,
    #[error("password cannot be empty")]
    EmptyPassword,
}

/// WiFi credentials to deliver to a device
///
/// Rendered on the wire as `ssid=<SSID>,password=<PASSWORD>`. The format has
/// no escaping: a `,` or `=` inside either value would misparse on the device
/// side. The firmware owns the format, so values must stay free of the
/// delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    /// Create credentials, rejecting blank fields
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let ssid = ssid.into();
        let password = password.into();
        if ssid.trim().is_empty() {
            return Err(CredentialsError::EmptySsid);
        }
        if password.trim().is_empty() {
            return Err(CredentialsError::EmptyPassword);
        }
        Ok(Self { ssid, password })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Render the payload string sent to the device
    pub fn wire_format(&self) -> String {
        format!("ssid={},password={}", self.ssid, self.password)
    }
}

/// Errors from framing a payload into packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("cannot frame an empty payload")]
    EmptyPayload,
    /// `max_packet_size` must leave room for one sentinel plus one data byte
    #[error("max packet size {0} too small (minimum 2)")]
    PacketSizeTooSmall(usize),
}

/// A single framed packet, at most `max_packet_size` bytes on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet(Vec<u8>);

impl Packet {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering, two digits per byte, no separators
    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }
}

/// Frame a payload into sentinel-bounded packets.
///
/// The first packet starts with `start`, the last packet ends with `end`, and
/// every packet holds at most `max_packet_size` bytes. Stripping the two
/// sentinels and concatenating the rest reproduces the payload exactly.
///
/// A transfer always produces at least two packets, even when the payload and
/// both sentinels would fit in one: the device reassembles from a start-marked
/// packet followed by an end-marked one, so the two-packet shape is part of
/// the framing contract.
pub fn frame_packets(
    payload: &[u8],
    start: u8,
    end: u8,
    max_packet_size: usize,
) -> Result<Vec<Packet>, FramingError> {
    if payload.is_empty() {
        return Err(FramingError::EmptyPayload);
    }
    if max_packet_size < 2 {
        return Err(FramingError::PacketSizeTooSmall(max_packet_size));
    }

    // One byte of each boundary packet is reserved for its sentinel.
    let max_data_first = max_packet_size - 1;
    let max_data_last = max_packet_size - 1;

    let (first_data, remaining) = payload.split_at(payload.len().min(max_data_first));
    let (middle_data, last_data) = if remaining.len() > max_data_last {
        remaining.split_at(remaining.len() - max_data_last)
    } else {
        (&[][..], remaining)
    };

    let mut packets = Vec::with_capacity(2 + middle_data.len().div_ceil(max_packet_size));

    let mut first = Vec::with_capacity(1 + first_data.len());
    first.push(start);
    first.extend_from_slice(first_data);
    packets.push(Packet(first));

    for chunk in middle_data.chunks(max_packet_size) {
        packets.push(Packet(chunk.to_vec()));
    }

    let mut last = Vec::with_capacity(last_data.len() + 1);
    last.extend_from_slice(last_data);
    last.push(end);
    packets.push(Packet(last));

    Ok(packets)
}

/// Frame a payload string into hex-encoded packets ready for transmission.
///
/// The payload is UTF-8 encoded before framing, so multi-byte characters
/// count by their encoded byte length against the packet boundaries.
pub fn split_into_packets(
    payload: &str,
    start: u8,
    end: u8,
    max_packet_size: usize,
) -> Result<Vec<String>, FramingError> {
    let packets = frame_packets(payload.as_bytes(), start, end, max_packet_size)?;
    Ok(packets.iter().map(Packet::to_hex).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::{DEFAULT_MAX_PACKET_SIZE, END_BYTE, START_BYTE};

    /// Strip the sentinels and concatenate what the device would reassemble.
    fn reassemble(packets: &[Packet]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (i, packet) in packets.iter().enumerate() {
            let mut data = packet.as_bytes();
            if i == 0 {
                data = &data[1..];
            }
            if i == packets.len() - 1 {
                data = &data[..data.len() - 1];
            }
            bytes.extend_from_slice(data);
        }
        bytes
    }

    fn sample_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| b'a' + (i % 26) as u8).collect()
    }

    #[test]
    fn round_trip_various_lengths() {
        for len in [1, 5, 18, 19, 20, 38, 39, 45, 58, 100] {
            let payload = sample_payload(len);
            let packets =
                frame_packets(&payload, START_BYTE, END_BYTE, DEFAULT_MAX_PACKET_SIZE).unwrap();
            assert_eq!(reassemble(&packets), payload, "payload length {len}");
            for packet in &packets {
                assert!(packet.len() <= DEFAULT_MAX_PACKET_SIZE);
            }
        }
    }

    #[test]
    fn round_trip_small_packet_sizes() {
        let payload = b"ssid=greenhouse,password=hunter2";
        for max in [2, 3, 5, 7, 20] {
            let packets = frame_packets(payload, START_BYTE, END_BYTE, max).unwrap();
            assert_eq!(reassemble(&packets), payload, "max packet size {max}");
            for packet in &packets {
                assert!(packet.len() <= max);
            }
        }
    }

    #[test]
    fn short_payload_still_produces_two_packets() {
        let packets = frame_packets(b"hi", START_BYTE, END_BYTE, DEFAULT_MAX_PACKET_SIZE).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].as_bytes(), &[START_BYTE, b'h', b'i']);
        // The whole payload fits next to the start sentinel, so the final
        // packet carries nothing but the end sentinel.
        assert_eq!(packets[1].as_bytes(), &[END_BYTE]);
    }

    #[test]
    fn seventeen_byte_credential_example() {
        let payload = "ssid=A,password=B";
        assert_eq!(payload.len(), 17);

        let hex =
            split_into_packets(payload, START_BYTE, END_BYTE, DEFAULT_MAX_PACKET_SIZE).unwrap();
        assert_eq!(hex.len(), 2);
        assert_eq!(hex[0], "02737369643d412c70617373776f72643d42");
        assert_eq!(hex[1], "03");
    }

    #[test]
    fn sentinel_placement() {
        // Letters only, so any 0x02/0x03 seen can only come from framing.
        let payload = sample_payload(90);
        let packets =
            frame_packets(&payload, START_BYTE, END_BYTE, DEFAULT_MAX_PACKET_SIZE).unwrap();

        assert_eq!(packets[0].as_bytes()[0], START_BYTE);
        let last = packets.last().unwrap().as_bytes();
        assert_eq!(*last.last().unwrap(), END_BYTE);

        for (i, packet) in packets.iter().enumerate() {
            for (j, byte) in packet.as_bytes().iter().enumerate() {
                let is_start = i == 0 && j == 0;
                let is_end = i == packets.len() - 1 && j == packet.len() - 1;
                if !is_start && !is_end {
                    assert_ne!(*byte, START_BYTE);
                    assert_ne!(*byte, END_BYTE);
                }
            }
        }
    }

    #[test]
    fn packet_count_formula() {
        let max = DEFAULT_MAX_PACKET_SIZE;
        for len in 1..=120 {
            let payload = sample_payload(len);
            let packets = frame_packets(&payload, START_BYTE, END_BYTE, max).unwrap();
            let middle = len.saturating_sub(2 * (max - 1));
            assert_eq!(packets.len(), 2 + middle.div_ceil(max), "payload length {len}");
        }
    }

    #[test]
    fn framing_is_deterministic() {
        let payload = "ssid=greenhouse,password=correct horse battery staple";
        let a = split_into_packets(payload, START_BYTE, END_BYTE, DEFAULT_MAX_PACKET_SIZE).unwrap();
        let b = split_into_packets(payload, START_BYTE, END_BYTE, DEFAULT_MAX_PACKET_SIZE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn multi_byte_characters_count_as_encoded_bytes() {
        let payload = "ssid=Café☕,password=żółć";
        let packets = frame_packets(
            payload.as_bytes(),
            START_BYTE,
            END_BYTE,
            DEFAULT_MAX_PACKET_SIZE,
        )
        .unwrap();
        assert_eq!(reassemble(&packets), payload.as_bytes());
        for packet in &packets {
            assert!(packet.len() <= DEFAULT_MAX_PACKET_SIZE);
        }
    }

    #[test]
    fn hex_is_lowercase_two_digits_per_byte() {
        let packets = frame_packets(
            "π".as_bytes(),
            START_BYTE,
            END_BYTE,
            DEFAULT_MAX_PACKET_SIZE,
        )
        .unwrap();
        // "π" encodes to 0xCF 0x80.
        assert_eq!(packets[0].to_hex(), "02cf80");
        for packet in &packets {
            let hex = packet.to_hex();
            assert_eq!(hex.len(), packet.len() * 2);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        }
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(
            frame_packets(b"", START_BYTE, END_BYTE, DEFAULT_MAX_PACKET_SIZE),
            Err(FramingError::EmptyPayload)
        );
    }

    #[test]
    fn packet_size_below_minimum_is_rejected() {
        for max in [0, 1] {
            assert_eq!(
                frame_packets(b"data", START_BYTE, END_BYTE, max),
                Err(FramingError::PacketSizeTooSmall(max))
            );
        }
        assert!(frame_packets(b"data", START_BYTE, END_BYTE, 2).is_ok());
    }

    #[test]
    fn credentials_wire_format() {
        let creds = Credentials::new("greenhouse", "hunter2").unwrap();
        assert_eq!(creds.wire_format(), "ssid=greenhouse,password=hunter2");
    }

    #[test]
    fn credentials_reject_blank_fields() {
        assert_eq!(
            Credentials::new("", "hunter2"),
            Err(CredentialsError::EmptySsid)
        );
        assert_eq!(
            Credentials::new("greenhouse", "   "),
            Err(CredentialsError::EmptyPassword)
        );
    }
}
