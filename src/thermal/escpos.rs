//! ESC/POS command encoding for raster receipts

use super::raster::MonoBitmap;
use bytes::{BufMut, Bytes, BytesMut};

pub const ESC: u8 = 0x1b;
pub const GS: u8 = 0x1d;

/// Tallest image a single `GS v 0` command may carry
pub const MAX_RASTER_BAND: u32 = 2303;

/// Lines fed before cutting so the last printed line clears the cutter
pub const FEED_BEFORE_CUT: u8 = 5;

/// One print job, built command by command
#[derive(Debug, Default)]
pub struct ReceiptJob {
    buf: BytesMut,
}

impl ReceiptJob {
    /// A job that starts by resetting the printer (`ESC @`)
    pub fn new() -> Self {
        let mut job = Self::default();
        job.initialize();
        job
    }

    pub fn initialize(&mut self) -> &mut Self {
        self.buf.put_slice(&[ESC, b'@']);
        self
    }

    /// `GS v 0` raster image, split into bands of at most [`MAX_RASTER_BAND`] rows
    pub fn raster(&mut self, bitmap: &MonoBitmap) -> &mut Self {
        let width_bytes = bitmap.bytes_per_row() as u16;
        let mut start = 0;

        while start < bitmap.height() {
            let end = (start + MAX_RASTER_BAND).min(bitmap.height());
            let band_height = (end - start) as u16;

            self.buf.put_slice(&[GS, b'v', b'0', 0]);
            self.buf.put_u16_le(width_bytes);
            self.buf.put_u16_le(band_height);
            self.buf.put_slice(bitmap.rows(start, end));

            start = end;
        }
        self
    }

    /// `ESC d n`: print and feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.put_slice(&[ESC, b'd', lines]);
        self
    }

    /// `GS V 0`: full cut
    pub fn cut(&mut self) -> &mut Self {
        self.buf.put_slice(&[GS, b'V', 0]);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Complete job for one receipt image: reset, image, feed, cut
pub fn encode_receipt(bitmap: &MonoBitmap) -> Bytes {
    let mut job = ReceiptJob::new();
    job.raster(bitmap).feed(FEED_BEFORE_CUT).cut();
    job.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermal::raster::to_monochrome;
    use image::{GrayImage, Luma};

    fn bitmap(width: u32, height: u32) -> MonoBitmap {
        to_monochrome(&GrayImage::from_pixel(width, height, Luma([0])), 128)
    }

    #[test]
    fn test_receipt_job_framing() {
        let bytes = encode_receipt(&bitmap(10, 2));

        assert_eq!(&bytes[..2], &[ESC, b'@']);
        // GS v 0, mode 0, 2 bytes wide, 2 rows high
        assert_eq!(&bytes[2..10], &[GS, b'v', b'0', 0, 2, 0, 2, 0]);
        assert_eq!(&bytes[10..14], &[0xFF, 0xC0, 0xFF, 0xC0]);
        assert_eq!(&bytes[14..], &[ESC, b'd', 5, GS, b'V', 0]);
    }

    #[test]
    fn test_tall_images_are_banded() {
        let height = MAX_RASTER_BAND + 10;
        let bytes = encode_receipt(&bitmap(8, height));

        let first_header = &bytes[2..10];
        assert_eq!(first_header, &[GS, b'v', b'0', 0, 1, 0, 0xFF, 0x08]);

        let second = 10 + MAX_RASTER_BAND as usize;
        assert_eq!(&bytes[second..second + 8], &[GS, b'v', b'0', 0, 1, 0, 10, 0]);
        assert_eq!(bytes.len(), 2 + 8 * 2 + height as usize + 6);
    }

    #[test]
    fn test_empty_job() {
        let job = ReceiptJob::default();
        assert!(job.is_empty());
        assert_eq!(ReceiptJob::new().len(), 2);
    }
}
