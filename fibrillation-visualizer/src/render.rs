use image::{GrayImage, Luma};

/// Gray level of a cell: resting is black, the end of the refractory period white.
///
/// Values above `refractory_period` are clipped to white.
pub fn gray_level(value: u16, refractory_period: u32) -> u8 {
    let vmax = refractory_period.max(1) as f32;
    let t = (value as f32 / vmax).min(1.0);
    (t * 255.0).round() as u8
}

/// Pixel dimensions of a frame, rounded up to even numbers for 4:2:0 encoding.
pub fn frame_dimensions(rows: usize, cols: usize, scale: u32) -> (u32, u32) {
    let width = cols as u32 * scale;
    let height = rows as u32 * scale;
    (width + width % 2, height + height % 2)
}

/// Draws a row-major grid as a grayscale frame, each cell a `scale` x `scale` block.
pub fn draw_frame(
    state: &[u16],
    rows: usize,
    cols: usize,
    scale: u32,
    refractory_period: u32,
) -> GrayImage {
    let (width, height) = frame_dimensions(rows, cols, scale);
    let scale = scale.max(1);
    let mut image = GrayImage::new(width, height);

    for (py, row_pixels) in image.rows_mut().enumerate() {
        let r = py / scale as usize;
        for (px, pixel) in row_pixels.enumerate() {
            let c = px / scale as usize;
            // Padding pixels past the grid stay black.
            if r < rows && c < cols {
                *pixel = Luma([gray_level(state[r * cols + c], refractory_period)]);
            }
        }
    }
    image
}

/// Converts a grayscale frame to planar YUV 4:2:0 with neutral chroma.
pub fn gray_to_yuv420(image: &GrayImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let y_plane_size = width * height;

    let mut yuv = Vec::with_capacity(y_plane_size + y_plane_size / 2);
    yuv.extend_from_slice(image.as_raw());
    // U and V planes are quarter size each
    yuv.resize(y_plane_size + y_plane_size / 2, 128);
    yuv
}
