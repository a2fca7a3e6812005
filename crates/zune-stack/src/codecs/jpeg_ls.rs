/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! JPEG-LS decoding and encoding support
//!
//! This delegates to [CharLS](https://github.com/team-charls/charls) through the
//! [`charls`] crate, building the C++ library from source.
//!
//! Decoded arrays are `(H, W)` for one component and `(H, W, C)` otherwise,
//! `uint8` for up to 8 bits per sample and `uint16` above that.
//! The encoder is lossless and takes `uint8` or `uint16` arrays of the same layouts,
//! with up to four components.

#![cfg(feature = "jpeg-ls")]

use charls::{CharLS, FrameInfo, InterleaveMode};
use log::trace;

use crate::array::{ElementType, NdArray};
use crate::codecs::{image_layout, image_shape, CodecTrait, ImageFormat};
use crate::errors::CodecErrors;

/// Start of frame marker for JPEG-LS
const SOF55: u8 = 0xF7;
/// Start of scan
const SOS: u8 = 0xDA;

/// Frame parameters read from the stream headers
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct JlsHeader {
    width:           usize,
    height:          usize,
    bits_per_sample: u8,
    components:      usize,
    /// Whether the components are stored one after the other
    planar:          bool
}

/// Walk the marker segments up to the first scan
fn read_header(data: &[u8]) -> Result<JlsHeader, CodecErrors> {
    let truncated = || CodecErrors::InvalidData("Truncated JPEG-LS header".into());

    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(CodecErrors::InvalidData("JPEG-LS SOI marker not found".into()));
    }
    let mut position = 2;
    let mut frame: Option<JlsHeader> = None;

    loop {
        let marker = data.get(position..position + 4).ok_or_else(truncated)?;
        if marker[0] != 0xFF {
            return Err(CodecErrors::InvalidData(format!(
                "Expected a marker at offset {position}"
            )));
        }
        let length = usize::from(u16::from_be_bytes([marker[2], marker[3]]));
        let segment = data
            .get(position + 4..position + 2 + length)
            .ok_or_else(truncated)?;

        match marker[1] {
            SOF55 => {
                if segment.len() < 6 {
                    return Err(truncated());
                }
                frame = Some(JlsHeader {
                    bits_per_sample: segment[0],
                    height:          usize::from(u16::from_be_bytes([segment[1], segment[2]])),
                    width:           usize::from(u16::from_be_bytes([segment[3], segment[4]])),
                    components:      usize::from(segment[5]),
                    planar:          false
                });
            }
            SOS => {
                let mut frame = frame.ok_or_else(|| {
                    CodecErrors::InvalidData("Scan found before the frame header".into())
                })?;
                let scan_components = usize::from(*segment.first().ok_or_else(truncated)?);
                // NEAR, ILV follow the component specifications
                let interleave = *segment.get(1 + 2 * scan_components + 1).ok_or_else(truncated)?;

                frame.planar = frame.components > 1 && (interleave == 0 || scan_components == 1);
                return Ok(frame);
            }
            _ => {}
        }
        position += 2 + length;
    }
}

/// The JPEG-LS codec
#[derive(Default, Copy, Clone, Debug)]
pub struct JpegLsCodec;

impl JpegLsCodec {
    pub fn new() -> JpegLsCodec {
        JpegLsCodec
    }
}

impl CodecTrait for JpegLsCodec {
    fn name(&self) -> &'static str {
        "jpeg-ls"
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::JPEG_LS
    }

    fn decode(&self, data: &[u8]) -> Result<NdArray, CodecErrors> {
        let header = read_header(data)?;
        trace!("JPEG-LS frame: {:?}", header);

        let element_type = match header.bits_per_sample {
            2..=8 => ElementType::U8,
            9..=16 => ElementType::U16,
            bits => {
                return Err(CodecErrors::InvalidData(format!(
                    "Unsupported bits per sample {bits}"
                )))
            }
        };
        let mut charls = CharLS::default();
        let decoded = charls
            .decode(data)
            .map_err(|x| CodecErrors::Backend(format!("{:?}", x)))?;

        let decoded = if header.planar {
            interleave(&decoded, header.components, element_type.size_of())
        } else {
            decoded
        };
        Ok(NdArray::new(
            image_shape(header.width, header.height, header.components),
            element_type,
            decoded
        )?)
    }

    fn encode(&self, array: &NdArray) -> Result<Vec<u8>, CodecErrors> {
        let bits_per_sample = match array.element_type() {
            ElementType::U8 => 8,
            ElementType::U16 => 16,
            other => return Err(CodecErrors::UnsupportedType(other, self.supported_types()))
        };
        let (width, height, components) = image_layout(array.shape())?;

        if components == 0
            || components > 4
            || width > usize::from(u16::MAX)
            || height > usize::from(u16::MAX)
        {
            return Err(CodecErrors::UnsupportedShape(array.shape().to_vec()));
        }
        let frame_info = FrameInfo {
            width:           width as _,
            height:          height as _,
            bits_per_sample: bits_per_sample as _,
            component_count: components as _
        };
        let mut charls = CharLS::default();

        if components > 1 {
            // arrays hold the components of a pixel together
            charls
                .set_interleave_mode(InterleaveMode::Sample)
                .map_err(|x| CodecErrors::Backend(format!("{:?}", x)))?;
        }
        // near = 0 is lossless
        charls
            .encode(frame_info, 0, array.as_bytes())
            .map_err(|x| CodecErrors::Backend(format!("{:?}", x)))
    }

    fn supported_types(&self) -> &'static [ElementType] {
        &[ElementType::U8, ElementType::U16]
    }
}

/// Planes one after the other into pixels with their components together
fn interleave(planar: &[u8], components: usize, size: usize) -> Vec<u8> {
    let plane_length = planar.len() / components;
    let pixels = plane_length / size;

    let mut output = Vec::with_capacity(planar.len());

    for pixel in 0..pixels {
        for component in 0..components {
            let start = component * plane_length + pixel * size;
            output.extend_from_slice(&planar[start..start + size]);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use nanorand::{Rng, WyRand};

    use crate::array::NdArray;
    use crate::codecs::jpeg_ls::{interleave, read_header, JpegLsCodec};
    use crate::codecs::CodecTrait;

    #[test]
    fn test_u8_is_lossless() {
        let mut rng = WyRand::new_seed(7);
        let pixels: Vec<u8> = (0..32 * 24).map(|_| rng.generate::<u8>()).collect();
        let array = NdArray::from_vec(vec![24, 32], pixels).unwrap();

        let codec = JpegLsCodec::new();
        let encoded = codec.encode(&array).unwrap();

        let header = read_header(&encoded).unwrap();
        assert_eq!((header.width, header.height, header.components), (32, 24, 1));

        assert_eq!(codec.decode(&encoded).unwrap(), array);
    }

    #[test]
    fn test_u16_is_lossless() {
        let pixels: Vec<u16> = (0..16 * 16).map(|x| (x * 251) as u16).collect();
        let array = NdArray::from_vec(vec![16, 16], pixels).unwrap();

        let codec = JpegLsCodec::new();
        let decoded = codec.decode(&codec.encode(&array).unwrap()).unwrap();

        assert_eq!(decoded, array);
    }

    #[test]
    fn test_rgb_keeps_interleaved_layout() {
        let mut rng = WyRand::new_seed(11);
        let pixels: Vec<u8> = (0..9 * 7 * 3).map(|_| rng.generate::<u8>()).collect();
        let array = NdArray::from_vec(vec![7, 9, 3], pixels).unwrap();

        let codec = JpegLsCodec::new();
        let encoded = codec.encode(&array).unwrap();

        let header = read_header(&encoded).unwrap();
        assert_eq!((header.width, header.height, header.components), (9, 7, 3));
        assert!(!header.planar);

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.shape(), &[7, 9, 3]);
        assert_eq!(decoded, array);
    }

    #[test]
    fn test_interleave_planes() {
        let planar = [1, 2, 3, 10, 20, 30];
        assert_eq!(interleave(&planar, 2, 1), vec![1, 10, 2, 20, 3, 30]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(JpegLsCodec::new().decode(b"definitely not jpeg-ls").is_err());
    }
}
