//! ELM327 command interpreter
//!
//! Pure function from one command plus the current vehicle state to the
//! adapter's reply. The server handles framing; this module only decides
//! what to say.

use obd_conv::convert::raw_to_bytes;
use obd_conv::registry::{by_wire_code, descriptors};
use obd_conv::{encode_raw, format_wire_code};

use crate::physics::VehicleState;

/// Identification string reported by `ATZ` and `ATI`
pub const ADAPTER_VERSION: &str = "ELM327 v1.5";
/// Every reply ends with this
pub const REPLY_TERMINATOR: &str = "\r\n>";

const AT_PREFIX: &str = "AT";
const MODE_01: &str = "01";
const MODE_01_RESPONSE: &str = "41";
const UNKNOWN: &str = "?";
/// PIDs answering with the supported-PID bitmap for the next 32 PIDs
const SUPPORT_PIDS: [u8; 3] = [0x00, 0x20, 0x40];

/// Reply to one command, or `None` for an empty line
///
/// Commands are case-insensitive and embedded whitespace is ignored.
pub fn respond(command: &str, state: &VehicleState) -> Option<String> {
    let command: String = command
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if command.is_empty() {
        return None;
    }

    let body = if let Some(at) = command.strip_prefix(AT_PREFIX) {
        at_command(at)
    } else if let Some(pids) = command.strip_prefix(MODE_01) {
        mode_01(pids, state).unwrap_or_else(|| UNKNOWN.to_string())
    } else {
        UNKNOWN.to_string()
    };

    Some(format!("{}{}", body, REPLY_TERMINATOR))
}

fn at_command(at: &str) -> String {
    match at {
        "Z" => format!("\r\n{}\r\nOK", ADAPTER_VERSION),
        "I" => ADAPTER_VERSION.to_string(),
        _ => "OK".to_string(),
    }
}

/// `41` + (pid + data) for each requested pid, `None` if the request is malformed
fn mode_01(pids: &str, state: &VehicleState) -> Option<String> {
    if pids.is_empty() || !pids.len().is_multiple_of(2) {
        return None;
    }
    let codes = hex::decode(pids).ok()?;

    let mut reply = String::from(MODE_01_RESPONSE);
    for code in codes {
        reply.push_str(&format_wire_code(code));
        reply.push_str(&pid_data(code, state));
    }
    Some(reply)
}

fn pid_data(code: u8, state: &VehicleState) -> String {
    if SUPPORT_PIDS.contains(&code) {
        return format!("{:08X}", supported_bitmap(code));
    }
    match by_wire_code(code) {
        Some(desc) => {
            let raw = encode_raw(desc.id, state.value(desc.id));
            hex::encode_upper(raw_to_bytes(desc.id, raw))
        }
        // unknown pids answer a single zero byte
        None => "00".to_string(),
    }
}

/// Supported-PID bitmap for `base + 1 ..= base + 32`
///
/// The MSB is PID `base + 1`. The last bit flags that the next bitmap PID
/// has something to report.
pub fn supported_bitmap(base: u8) -> u32 {
    let base = base as u32;
    descriptors()
        .iter()
        .map(|d| d.wire_code as u32)
        .chain(SUPPORT_PIDS.iter().map(|&p| p as u32).filter(|&p| p > base))
        .filter(|&pid| pid > base && pid <= base + 32)
        .filter(|&pid| pid != base + 32 || has_pids_above(base + 32))
        .fold(0u32, |bits, pid| bits | (1u32 << (32 - (pid - base))))
}

fn has_pids_above(pid: u32) -> bool {
    descriptors().iter().any(|d| d.wire_code as u32 > pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_conv::{decode, BatchPlan, ChannelId};
    use pretty_assertions::assert_eq;

    fn reply(command: &str) -> String {
        respond(command, &VehicleState::default()).unwrap()
    }

    #[test]
    fn test_reset_greeting() {
        assert_eq!(reply("ATZ"), "\r\nELM327 v1.5\r\nOK\r\n>");
        assert_eq!(reply("ATI"), "ELM327 v1.5\r\n>");
    }

    #[test]
    fn test_other_at_commands_ok() {
        for cmd in ["ATE0", "ATL0", "ATS0", "ATH0", "ATSP0", "at sp 0"] {
            assert_eq!(reply(cmd), "OK\r\n>", "{}", cmd);
        }
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(reply("0902"), "?\r\n>");
        assert_eq!(reply("HELLO"), "?\r\n>");
        assert_eq!(reply("01"), "?\r\n>");
        assert_eq!(reply("010"), "?\r\n>");
        assert_eq!(reply("01ZZ"), "?\r\n>");
    }

    #[test]
    fn test_empty_command_is_silent() {
        assert_eq!(respond("", &VehicleState::default()), None);
        assert_eq!(respond("  \n", &VehicleState::default()), None);
    }

    #[test]
    fn test_fast_batch_from_default_state() {
        // 800 rpm * 4 = 0x0C80, MAP 100 kPa = 0x64
        assert_eq!(reply("010C0B"), "410C0C800B64\r\n>");
    }

    #[test]
    fn test_known_encodings() {
        let state = VehicleState {
            coolant: 85.0,
            voltage: 14.1,
            timing: 15.0,
            ltft: 2.3,
            lambda: 1.0,
            ..VehicleState::default()
        };
        let r = |c: &str| respond(c, &state).unwrap();
        assert_eq!(r("0105"), "41057D\r\n>");
        assert_eq!(r("0142"), "41423714\r\n>");
        assert_eq!(r("010E"), "410E9E\r\n>");
        assert_eq!(r("0107"), "410783\r\n>");
        assert_eq!(r("0144"), "41448000\r\n>");
        assert_eq!(r("0133"), "413364\r\n>");
    }

    #[test]
    fn test_unknown_pid_answers_zero() {
        assert_eq!(reply("01A6"), "41A600\r\n>");
        assert_eq!(reply("010CA6"), "410C0C80A600\r\n>");
    }

    #[test]
    fn test_supported_bitmap() {
        assert_eq!(reply("0100"), "41001E3F8001\r\n>");
        assert_eq!(supported_bitmap(0x00), 0x1E3F_8001);
        // 0x33 -> bit 32 - 0x13, plus 0x40 since 0x42/0x44/0x5C exist
        assert_eq!(supported_bitmap(0x20), (1u32 << 13) | 1);
        // 0x42, 0x44, 0x5C; nothing above 0x60
        assert_eq!(supported_bitmap(0x40), (1u32 << 30) | (1 << 28) | (1 << 4));
    }

    #[test]
    fn test_client_decodes_every_channel() {
        let state = VehicleState {
            rpm: 3456.0,
            throttle: 42.0,
            coolant: 91.0,
            ..VehicleState::default()
        };
        for desc in descriptors() {
            let plan = BatchPlan::new(vec![desc.id]).unwrap();
            let response = respond(plan.request(), &state).unwrap();
            let samples = decode(response.as_bytes(), plan.channels()).unwrap();
            let value = obd_conv::convert(desc.id, samples[0].raw);
            let expected = state.value(desc.id);
            assert!(
                (value - expected).abs() <= obd_conv::resolution(desc.id),
                "{}: {} vs {}",
                desc.id,
                value,
                expected
            );
        }
        assert_eq!(state.value(ChannelId::Rpm), 3456.0);
    }
}
