/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! JPEG-XL decoding and encoding support
//! This uses the delegate library [`zune-jpegxl`](zune_jpegxl)
//! for encoding and [`jxl-oxide`](jxl_oxide) for decoding images
//!
//! Arrays are `(H, W)` for grayscale and `(H, W, C)` for images with more
//! channels, always `uint8`.

#![cfg(feature = "jpeg-xl")]

use jxl_oxide::{JxlImage, PixelFormat};
use log::trace;
use zune_core::bit_depth::BitDepth;
use zune_core::colorspace::ColorSpace;
use zune_core::options::EncoderOptions;
use zune_jpegxl::{JxlEncodeErrors, JxlSimpleEncoder};

use crate::array::{ElementType, NdArray};
use crate::codecs::{image_layout, image_shape, CodecTrait, ImageFormat};
use crate::errors::CodecErrors;

/// A JXL codec that ties the bridge between [`NdArray`] and
/// the [zune_jpegxl::JxlSimpleEncoder] encoder and the [jxl_oxide::JxlImage] decoder
///
/// The encoder is lossless, so a `uint8` array written and read back is unchanged.
#[derive(Default, Copy, Clone, Debug)]
pub struct JxlCodec;

impl JxlCodec {
    pub fn new() -> JxlCodec {
        JxlCodec
    }
}

impl CodecTrait for JxlCodec {
    fn name(&self) -> &'static str {
        "jpeg-xl"
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::JPEG_XL
    }

    fn decode(&self, data: &[u8]) -> Result<NdArray, CodecErrors> {
        let image = JxlImage::builder()
            .read(data)
            .map_err(|x| CodecErrors::Backend(format!("{:?}", x)))?;

        let (width, height) = (image.width() as usize, image.height() as usize);

        let components = match image.pixel_format() {
            PixelFormat::Gray => 1,
            PixelFormat::Graya => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::Cmyk => 4,
            PixelFormat::Cmyka => 5
        };
        trace!("Image dimensions: ({},{})", width, height);
        trace!("Image components: {}", components);

        // only the first frame, animations aren't stacked
        let render = image
            .render_frame(0)
            .map_err(|x| CodecErrors::Backend(format!("{}", x)))?;

        let planes = render.image_planar();

        if planes.len() < components {
            return Err(CodecErrors::InvalidData(format!(
                "Expected {} channels but the decoder produced {}",
                components,
                planes.len()
            )));
        }
        let pixels = width * height;
        let mut output = vec![0_u8; pixels * components];

        for (component, plane) in planes.iter().take(components).enumerate() {
            let plane = plane.buf();

            if plane.len() < pixels {
                return Err(CodecErrors::InvalidData("Decoded plane is too short".into()));
            }
            // decoder outputs planar floats in [0,1], we want interleaved u8
            for (out, value) in output[component..]
                .iter_mut()
                .step_by(components)
                .zip(plane)
            {
                *out = (value * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(NdArray::new(
            image_shape(width, height, components),
            ElementType::U8,
            output
        )?)
    }

    fn encode(&self, array: &NdArray) -> Result<Vec<u8>, CodecErrors> {
        if array.element_type() != ElementType::U8 {
            return Err(CodecErrors::UnsupportedType(
                array.element_type(),
                self.supported_types()
            ));
        }
        let (width, height, components) = image_layout(array.shape())?;

        let colorspace = match components {
            1 => ColorSpace::Luma,
            2 => ColorSpace::LumaA,
            3 => ColorSpace::RGB,
            4 => ColorSpace::RGBA,
            _ => return Err(CodecErrors::UnsupportedShape(array.shape().to_vec()))
        };
        let options = EncoderOptions::new(width, height, colorspace, BitDepth::Eight);

        let encoder = JxlSimpleEncoder::new(array.as_bytes(), options);

        encoder
            .encode()
            .map_err(<JxlEncodeErrors as Into<CodecErrors>>::into)
    }

    fn supported_types(&self) -> &'static [ElementType] {
        &[ElementType::U8]
    }
}

impl From<JxlEncodeErrors> for CodecErrors {
    fn from(value: JxlEncodeErrors) -> Self {
        CodecErrors::Backend(format!("{:?}", value))
    }
}

#[cfg(test)]
mod tests {
    use crate::array::{ElementType, NdArray};
    use crate::codecs::jpeg_xl::JxlCodec;
    use crate::codecs::CodecTrait;

    #[test]
    fn test_grayscale_is_lossless() {
        let pixels: Vec<u8> = (0..48_u32).map(|x| (x * 5) as u8).collect();
        let array = NdArray::from_vec(vec![6, 8], pixels).unwrap();

        let codec = JxlCodec::new();
        let decoded = codec.decode(&codec.encode(&array).unwrap()).unwrap();

        assert_eq!(decoded, array);
    }

    #[test]
    fn test_codec_is_named_after_the_format() {
        let codec = JxlCodec::new();
        assert_eq!(codec.name(), "jpeg-xl");
        assert_eq!(codec.format().default_extension(), "jxl");
    }

    #[test]
    fn test_rgb_keeps_interleaved_layout() {
        let pixels: Vec<u8> = (0..4 * 5 * 3_u32).map(|x| (x * 3 % 256) as u8).collect();
        let array = NdArray::from_vec(vec![4, 5, 3], pixels).unwrap();

        let codec = JxlCodec::new();
        let decoded = codec.decode(&codec.encode(&array).unwrap()).unwrap();

        assert_eq!(decoded.shape(), &[4, 5, 3]);
        assert_eq!(decoded, array);
    }

    #[test]
    fn test_encoder_refuses_wide_types() {
        let array = NdArray::zeros(vec![2, 2], ElementType::F64).unwrap();
        assert!(JxlCodec::new().encode(&array).is_err());
    }
}
