//! Hand-rolled equivalent of spec §4.2's `DATE_REGEX`. No regex engine is
//! pulled in for a single fixed-grammar sniff; this mirrors the fixed
//! `D:YYYYMMDDHHmmSSOHH'mm'` layout positionally.

use super::object::DateValue;

/// Parses a `D:`-prefixed PDF date string (already confirmed to start
/// with the `D:` sniff prefix by the caller). Returns `None` if the
/// digits don't form a valid calendar date shape.
pub fn parse_date(bytes: &[u8]) -> Option<DateValue> {
    let text: String = bytes.iter().map(|&b| b as char).collect();
    let rest = text.strip_prefix("D:")?;
    let chars: Vec<char> = rest.chars().collect();
    let mut pos = 0;

    let take_digits = |chars: &[char], pos: &mut usize, n: usize| -> Option<u32> {
        if *pos + n > chars.len() || !chars[*pos..*pos + n].iter().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let s: String = chars[*pos..*pos + n].iter().collect();
        *pos += n;
        s.parse().ok()
    };

    let year = take_digits(&chars, &mut pos, 4)?;
    let month = take_digits(&chars, &mut pos, 2).unwrap_or(1).clamp(1, 12);
    let day = take_digits(&chars, &mut pos, 2).unwrap_or(1).clamp(1, 31);
    let hour = take_digits(&chars, &mut pos, 2).unwrap_or(0);
    let minute = take_digits(&chars, &mut pos, 2).unwrap_or(0);
    let second = take_digits(&chars, &mut pos, 2).unwrap_or(0);

    let mut tz_offset_minutes = None;
    if pos < chars.len() {
        match chars[pos] {
            'Z' => {
                tz_offset_minutes = Some(0);
                pos += 1;
            }
            sign @ ('+' | '-') => {
                pos += 1;
                let tz_hour = take_digits(&chars, &mut pos, 2).unwrap_or(0);
                if pos < chars.len() && chars[pos] == '\'' {
                    pos += 1;
                }
                let tz_min = take_digits(&chars, &mut pos, 2).unwrap_or(0);
                let mut total = (tz_hour * 60 + tz_min) as i32;
                if sign == '-' {
                    total = -total;
                }
                tz_offset_minutes = Some(total);
            }
            _ => {}
        }
    }

    Some(DateValue {
        year,
        month: month as u8,
        day: day as u8,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
        tz_offset_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_date_with_timezone() {
        let d = parse_date(b"D:19990101120000-08'00'").unwrap();
        assert_eq!(d.year, 1999);
        assert_eq!(d.month, 1);
        assert_eq!(d.hour, 12);
        assert_eq!(d.tz_offset_minutes, Some(-480));
    }

    #[test]
    fn defaults_missing_fields() {
        let d = parse_date(b"D:2024").unwrap();
        assert_eq!(d.month, 1);
        assert_eq!(d.day, 1);
        assert_eq!(d.hour, 0);
    }

    #[test]
    fn utc_z_marker() {
        let d = parse_date(b"D:20200630Z").unwrap();
        assert_eq!(d.tz_offset_minutes, Some(0));
    }
}
