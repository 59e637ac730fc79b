//! Stream filter codecs. A filter chain is a small ordered list of
//! `FilterSpec`s built by the orchestrator from a stream's `/Filter` and
//! `/DecodeParms` entries; decode failures never propagate as a hard
//! error - they turn into a warning and empty bytes instead.

use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

use super::error::{PDFError, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngPredictor {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

#[derive(Debug, Clone)]
pub struct PredictorParams {
    pub predictor: u8,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub name: String,
    pub predictor: Option<PredictorParams>,
}

pub fn decode_flate(compressed: &[u8]) -> Result<Vec<u8>, PDFError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    if decoder.read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    let mut raw = DeflateDecoder::new(compressed);
    raw.read_to_end(&mut out).map_err(|e| PDFError::Codec {
        filter: "FlateDecode".into(),
        message: format!("zlib and raw deflate both failed: {}", e),
    })?;
    Ok(out)
}

pub fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>, PDFError> {
    let mut result = Vec::new();
    let mut hex_buffer = String::new();
    for &byte in data {
        let ch = byte as char;
        if ch.is_ascii_hexdigit() {
            hex_buffer.push(ch);
            if hex_buffer.len() == 2 {
                if let Ok(v) = u8::from_str_radix(&hex_buffer, 16) {
                    result.push(v);
                }
                hex_buffer.clear();
            }
        } else if ch == '>' {
            break;
        }
    }
    if !hex_buffer.is_empty() {
        if let Ok(v) = u8::from_str_radix(&format!("{}0", hex_buffer), 16) {
            result.push(v);
        }
    }
    Ok(result)
}

pub fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>, PDFError> {
    let mut result = Vec::new();
    let mut tuple: u32 = 0;
    let mut count = 0usize;
    for &byte in data {
        let ch = byte as char;
        if ch == '~' || ch == '>' {
            break;
        } else if ch == 'z' {
            if count == 0 {
                result.extend_from_slice(&[0u8; 4]);
            }
            continue;
        } else if ch.is_whitespace() {
            continue;
        } else if ('!'..='u').contains(&ch) {
            tuple = tuple.wrapping_mul(85).wrapping_add((ch as u32) - ('!' as u32));
            count += 1;
            if count == 5 {
                result.extend_from_slice(&tuple.to_be_bytes());
                tuple = 0;
                count = 0;
            }
        } else {
            return Err(PDFError::Codec {
                filter: "ASCII85Decode".into(),
                message: format!("invalid character '{}'", ch),
            });
        }
    }
    if count > 0 {
        for _ in count..5 {
            tuple = tuple.wrapping_mul(85);
        }
        let bytes = tuple.to_be_bytes();
        result.extend_from_slice(&bytes[..count - 1]);
    }
    Ok(result)
}

pub fn decode_png_predictor(
    data: &[u8],
    colors: usize,
    bits_per_component: usize,
    columns: usize,
) -> Result<Vec<u8>, PDFError> {
    let pix_bytes = (colors * bits_per_component + 7) / 8;
    let row_bytes = (columns * colors * bits_per_component + 7) / 8;
    let stride = 1 + row_bytes;
    if stride == 0 || data.len() % stride != 0 {
        return Err(PDFError::Codec {
            filter: "PNG predictor".into(),
            message: format!("data size {} doesn't divide stride {}", data.len(), stride),
        });
    }
    let num_rows = data.len() / stride;
    let mut output = Vec::with_capacity(num_rows * row_bytes);
    let mut prev_row = vec![0u8; row_bytes];

    for row_idx in 0..num_rows {
        let row_start = row_idx * stride;
        let predictor_byte = data[row_start];
        let raw = &data[row_start + 1..row_start + 1 + row_bytes];
        match predictor_byte {
            0 => {
                output.extend_from_slice(raw);
                prev_row.copy_from_slice(raw);
            }
            1 => {
                for i in 0..pix_bytes.min(row_bytes) {
                    let v = raw[i];
                    output.push(v);
                    prev_row[i] = v;
                }
                for i in pix_bytes..row_bytes {
                    let v = output[output.len() - pix_bytes].wrapping_add(raw[i]);
                    output.push(v);
                    prev_row[i] = v;
                }
            }
            2 => {
                for i in 0..row_bytes {
                    let v = prev_row[i].wrapping_add(raw[i]);
                    output.push(v);
                    prev_row[i] = v;
                }
            }
            3 => {
                for i in 0..pix_bytes.min(row_bytes) {
                    let v = ((prev_row[i] as u16) / 2) as u8;
                    let v = v.wrapping_add(raw[i]);
                    output.push(v);
                    prev_row[i] = v;
                }
                for i in pix_bytes..row_bytes {
                    let left = output[output.len() - pix_bytes] as u16;
                    let up = prev_row[i] as u16;
                    let avg = ((left + up) / 2) as u8;
                    let v = avg.wrapping_add(raw[i]);
                    output.push(v);
                    prev_row[i] = v;
                }
            }
            4 => {
                for i in 0..pix_bytes.min(row_bytes) {
                    let v = prev_row[i].wrapping_add(raw[i]);
                    output.push(v);
                    prev_row[i] = v;
                }
                for i in pix_bytes..row_bytes {
                    let left = output[output.len() - pix_bytes] as i32;
                    let up = prev_row[i] as i32;
                    let up_left = prev_row[i - pix_bytes] as i32;
                    let p = left + up - up_left;
                    let pa = (p - left).abs();
                    let pb = (p - up).abs();
                    let pc = (p - up_left).abs();
                    let predicted = if pa <= pb && pa <= pc {
                        left
                    } else if pb <= pc {
                        up
                    } else {
                        up_left
                    };
                    let v = (predicted as u8).wrapping_add(raw[i]);
                    output.push(v);
                    prev_row[i] = v;
                }
            }
            other => {
                return Err(PDFError::Codec {
                    filter: "PNG predictor".into(),
                    message: format!("unsupported predictor tag {}", other),
                })
            }
        }
    }
    Ok(output)
}

fn apply_filter(data: &[u8], name: &str) -> Result<Vec<u8>, PDFError> {
    match name {
        "FlateDecode" | "Fl" => decode_flate(data),
        "ASCIIHexDecode" | "AHx" => decode_ascii_hex(data),
        "ASCII85Decode" | "A85" => decode_ascii85(data),
        other => Err(PDFError::Codec {
            filter: other.to_string(),
            message: "filter not implemented".into(),
        }),
    }
}

/// Applies a filter chain (spec §4.5 step 5). Filters execute in
/// last-to-first order - `/Filter [/FlateDecode /ASCIIHexDecode]` decodes
/// the ASCIIHex layer first, since that's the outermost encoding applied
/// when the file was written. A failing filter aborts the remaining
/// chain and yields empty bytes, matching the orchestrator's recovery
/// policy for stream decode errors.
pub fn decode_filters(data: &[u8], filters: &[FilterSpec]) -> (Vec<u8>, Vec<Warning>) {
    let mut warnings = Vec::new();
    let mut current = data.to_vec();

    #[cfg(feature = "debug-logging")]
    eprintln!("DEBUG: decoding {} filters", filters.len());

    for spec in filters.iter().rev() {
        match apply_filter(&current, &spec.name) {
            Ok(mut decoded) => {
                if let Some(p) = &spec.predictor {
                    if p.predictor >= 10 {
                        match decode_png_predictor(&decoded, p.colors, p.bits_per_component, p.columns) {
                            Ok(predicted) => decoded = predicted,
                            Err(e) => {
                                warnings.push(
                                    Warning::new("parser:error:stream:decode", "predictor failed")
                                        .with_context(spec.name.clone())
                                        .with_cause(e),
                                );
                                decoded = Vec::new();
                            }
                        }
                    }
                }
                current = decoded;
            }
            Err(e) => {
                let code = match &e {
                    PDFError::Codec { message, .. } if message.contains("not implemented") => {
                        "decoder:not_implemented:stream_filter"
                    }
                    _ => "decoder:error:stream_filter",
                };
                warnings.push(Warning::new(code, e.to_string()).with_context(spec.name.clone()));
                current = Vec::new();
                break;
            }
        }
    }
    (current, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn flate_round_trip() {
        let original = b"Hello, PDF world!";
        let compressed = zlib_compress(original);
        assert_eq!(decode_flate(&compressed).unwrap(), original);
    }

    #[test]
    fn ascii_hex_with_whitespace_and_odd_length() {
        assert_eq!(decode_ascii_hex(b"48 65\n6C\t6C 6F>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"48656C6C").unwrap(), b"Hell");
    }

    #[test]
    fn ascii85_zero_shortcut_and_terminator() {
        assert_eq!(decode_ascii85(b"z").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode_ascii85(b"87cURD~>").unwrap(), b"Hell");
    }

    #[test]
    fn unsupported_filter_warns_with_empty_output() {
        let filters = vec![FilterSpec {
            name: "JBIG2Decode".into(),
            predictor: None,
        }];
        let (out, warnings) = decode_filters(b"whatever", &filters);
        assert!(out.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "decoder:not_implemented:stream_filter");
    }

    #[test]
    fn multi_filter_chain_decodes_in_reverse_array_order() {
        let original = b"Test data for chained filters";
        let compressed = zlib_compress(original);
        let hex = hex::encode_upper(&compressed);
        let filters = vec![
            FilterSpec {
                name: "FlateDecode".into(),
                predictor: None,
            },
            FilterSpec {
                name: "ASCIIHexDecode".into(),
                predictor: None,
            },
        ];
        let (out, warnings) = decode_filters(hex.as_bytes(), &filters);
        assert!(warnings.is_empty());
        assert_eq!(out, original);
    }

    #[test]
    fn png_up_predictor_reverses_prediction() {
        // 1 row, 1 byte per pixel, predictor tag 2 (Up), columns=2
        let data = [2u8, 5, 5];
        let out = decode_png_predictor(&data, 1, 8, 2).unwrap();
        assert_eq!(out, vec![5, 5]);
    }
}
