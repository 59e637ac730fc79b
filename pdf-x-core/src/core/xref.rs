//! Cross-reference entry model and the xref-stream record decoder
//! (spec §4.5.2). Classical xref tables are tokenized whole by the
//! `Tokenizer` (see `token::XrefSectionPayload`); this module turns the
//! tokenizer's raw `(f1, f2, type_char)` triples, or a decoded xref
//! stream's packed records, into the same `XrefEntry` shape so the
//! orchestrator doesn't need to care which source produced them.

use super::error::Warning;
use super::token::RawXrefEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    Free { next_free: u64, reuse_gen: u32 },
    InUse { offset: u64, gen: u32 },
    Compressed { stream_num: u32, index_in_stream: u32 },
    Unknown { kind: u64, fields: [u64; 2] },
}

impl XrefEntry {
    pub fn is_free(&self) -> bool {
        matches!(self, XrefEntry::Free { .. })
    }
}

/// Converts one classical-table row into an entry. Per spec's recorded
/// open question, the *third* field (the type character) determines
/// free-vs-in-use, not the generation field.
pub fn classical_entry(raw: RawXrefEntry) -> XrefEntry {
    if raw.type_char == 'f' {
        XrefEntry::Free {
            next_free: raw.f1,
            reuse_gen: raw.f2,
        }
    } else {
        XrefEntry::InUse {
            offset: raw.f1,
            gen: raw.f2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct XrefStreamLayout {
    pub widths: [u8; 3],
    /// `(start_num, count)` subsections; defaults to `[(0, size)]` if the
    /// `/Index` entry is absent.
    pub subsections: Vec<(u64, u64)>,
}

fn read_be(bytes: &[u8], offset: usize, width: u8) -> Option<u64> {
    if width == 0 {
        return None;
    }
    let width = width as usize;
    let mut value: u64 = 0;
    for i in 0..width {
        value = (value << 8) | bytes[offset + i] as u64;
    }
    Some(value)
}

/// Decodes a fully-inflated xref-stream payload into `(obj_num, entry)`
/// pairs. `widths` must already be validated to be in `0..=4` by the
/// caller (the orchestrator warns and aborts this stream's classification
/// otherwise).
pub fn decode_xref_stream(
    data: &[u8],
    layout: &XrefStreamLayout,
) -> (Vec<(u64, XrefEntry)>, Vec<Warning>) {
    let mut warnings = Vec::new();
    let record_len = layout.widths.iter().map(|&w| w as usize).sum::<usize>();
    if record_len == 0 {
        warnings.push(Warning::new(
            "parser:invalid_stream:xref_zero_width",
            "xref stream has zero total column width",
        ));
        return (Vec::new(), warnings);
    }

    let mut entries = Vec::new();
    let mut pos = 0usize;
    for &(start_num, count) in &layout.subsections {
        for i in 0..count {
            if pos + record_len > data.len() {
                warnings.push(Warning::new(
                    "parser:invalid_stream:xref_truncated",
                    "xref stream payload shorter than declared subsections",
                ));
                return (entries, warnings);
            }
            let f0 = read_be(data, pos, layout.widths[0]).unwrap_or(1);
            let f1 = read_be(data, pos + layout.widths[0] as usize, layout.widths[1]).unwrap_or(0);
            let f2 = read_be(
                data,
                pos + layout.widths[0] as usize + layout.widths[1] as usize,
                layout.widths[2],
            )
            .unwrap_or(0);
            pos += record_len;

            let entry = match f0 {
                0 => XrefEntry::Free {
                    next_free: f1,
                    reuse_gen: f2 as u32,
                },
                1 => XrefEntry::InUse {
                    offset: f1,
                    gen: f2 as u32,
                },
                2 => XrefEntry::Compressed {
                    stream_num: f1 as u32,
                    index_in_stream: f2 as u32,
                },
                other => XrefEntry::Unknown {
                    kind: other,
                    fields: [f1, f2],
                },
            };
            entries.push((start_num + i, entry));
        }
    }
    (entries, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classical_entry_uses_type_char_not_generation() {
        let free = classical_entry(RawXrefEntry {
            f1: 0,
            f2: 65535,
            type_char: 'f',
        });
        assert_eq!(
            free,
            XrefEntry::Free {
                next_free: 0,
                reuse_gen: 65535
            }
        );

        let in_use = classical_entry(RawXrefEntry {
            f1: 15,
            f2: 0,
            type_char: 'n',
        });
        assert_eq!(
            in_use,
            XrefEntry::InUse {
                offset: 15,
                gen: 0
            }
        );
    }

    #[test]
    fn decode_xref_stream_matches_scenario_s4() {
        // /W [1 2 1] /Size 3 /Index [0 3]
        let data: [u8; 12] = [
            0x00, 0x00, 0x00, 0x00, // free, next=0, gen=0
            0x01, 0x00, 0x0F, 0x00, // in-use, offset=15, gen=0
            0x02, 0x00, 0x02, 0x01, // compressed, stream=2, index=1
        ];
        let layout = XrefStreamLayout {
            widths: [1, 2, 1],
            subsections: vec![(0, 3)],
        };
        let (entries, warnings) = decode_xref_stream(&data, &layout);
        assert!(warnings.is_empty());
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            (
                0,
                XrefEntry::Free {
                    next_free: 0,
                    reuse_gen: 0
                }
            )
        );
        assert_eq!(
            entries[1],
            (
                1,
                XrefEntry::InUse {
                    offset: 15,
                    gen: 0
                }
            )
        );
        assert_eq!(
            entries[2],
            (
                2,
                XrefEntry::Compressed {
                    stream_num: 2,
                    index_in_stream: 1
                }
            )
        );
    }

    #[test]
    fn decode_xref_stream_zero_width_column_is_null() {
        // field 0 has width 0, so the type defaults to 1 (in-use).
        let data: [u8; 3] = [0x00, 0x05, 0x00];
        let layout = XrefStreamLayout {
            widths: [0, 2, 0],
            subsections: vec![(0, 1)],
        };
        let (entries, warnings) = decode_xref_stream(&data, &layout);
        assert!(warnings.is_empty());
        assert_eq!(
            entries[0],
            (
                0,
                XrefEntry::InUse {
                    offset: 5,
                    gen: 0
                }
            )
        );
    }
}
