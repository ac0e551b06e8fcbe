use akaze_cli::{gray_image_to_float, write_keyfile, Akaze, Config, KeyfileFormat};
use image::{ImageReader, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_circle_mut;
use std::time::Instant;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "input.png".to_string());
    let binary_keyfile = args.any(|a| a == "--binary");

    // Load grayscale image
    let img = ImageReader::open(&input)
        .expect("Image not found")
        .decode()
        .expect("Decode failed")
        .to_luma8();

    let (w, h) = img.dimensions();
    let akaze = Akaze::new(Config::new(w as usize, h as usize)).expect("Invalid configuration");
    let float_img = gray_image_to_float(&img);

    // Time the full pipeline
    let t0 = Instant::now();
    let (kps, desc) = akaze.extract(&float_img).expect("Feature extraction failed");
    let elapsed = t0.elapsed();

    println!("Time taken: {:.2?}", elapsed);
    println!("Detected {} keypoints", kps.len());
    println!("Extracted {} descriptors", desc.len());

    let stem = input.rsplit_once('.').map(|(s, _)| s).unwrap_or(&input);
    let keyfile = format!("{}.keys", stem);
    let format = if binary_keyfile {
        KeyfileFormat::Binary
    } else {
        KeyfileFormat::Text
    };
    write_keyfile(&keyfile, &kps, &desc, format).expect("Failed to write keypoint file");
    println!("Saved keypoints to {}", keyfile);

    // Convert image to RGBA for drawing
    let mut output: RgbaImage = image::DynamicImage::ImageLuma8(img).into_rgba8();

    // Circle radius follows the keypoint scale
    for kp in &kps {
        draw_hollow_circle_mut(
            &mut output,
            (kp.x as i32, kp.y as i32),
            kp.size.round().max(2.0) as i32,
            Rgba([255, 0, 0, 255]),
        );
    }

    let overlay = format!("{}_keypoints.png", stem);
    output.save(&overlay).expect("Failed to save output image");
    println!("Saved result image as {}", overlay);
}
