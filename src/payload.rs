//! JSON body of the network report.
//!
//! Flat object, every field always present, −1 standing in for any reading
//! that is not available.

use core::fmt::Write;

use heapless::String;

use crate::shared::FusedSample;

/// Upper bound of a formatted payload.
pub const PAYLOAD_CAPACITY: usize = 192;

pub type Payload = String<PAYLOAD_CAPACITY>;

/// Formats `sample` as `{"sensor_id":…,"temperature":…,"humidity":…,"pm25":…,"tvoc":…,"co2":…}`.
///
/// Fails only if the result does not fit into [`PAYLOAD_CAPACITY`].
pub fn format_payload(sensor_id: &str, sample: &FusedSample) -> Result<Payload, core::fmt::Error> {
    let mut json = Payload::new();
    json.push_str("{\"sensor_id\":").map_err(|_| core::fmt::Error)?;
    write_json_string(&mut json, sensor_id)?;
    write!(
        json,
        ",\"temperature\":{:.2},\"humidity\":{:.2},\"pm25\":{:.2},\"tvoc\":{:.2},\"co2\":{}}}",
        sample.temperature,
        sample.humidity,
        sample.pm25,
        sample.iaq,
        sample.co2_ppm,
    )?;
    Ok(json)
}

/// Writes `value` as a quoted JSON string.
fn write_json_string<W: Write>(out: &mut W, value: &str) -> core::fmt::Result {
    out.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}
