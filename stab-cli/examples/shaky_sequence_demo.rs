use image::Rgba;
use stab_cli::{Frame, StabilizerBuilder};
use std::time::Instant;

/// Synthetic textured frame with its content shifted by (dx, dy)
fn scene(width: u32, height: u32, dx: i64, dy: i64) -> Frame {
    Frame::from_fn(width, height, |x, y| {
        let bx = (x as i64 - dx).div_euclid(12) as u64;
        let by = (y as i64 - dy).div_euclid(12) as u64;
        let h = bx.wrapping_mul(2_654_435_761) ^ by.wrapping_mul(40_503);
        let v = (h % 239) as u8;
        Rgba([v, 255 - v, v / 2 + 60, 255])
    })
}

fn interior_error(a: &Frame, b: &Frame) -> f64 {
    let margin = 24;
    let mut total = 0.0;
    let mut n = 0usize;
    for y in margin..a.height() - margin {
        for x in margin..a.width() - margin {
            total += (a.get_pixel(x, y)[0] as f64 - b.get_pixel(x, y)[0] as f64).abs();
            n += 1;
        }
    }
    total / n as f64
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎥 Stabilization Demo");
    println!("=====================\n");

    let (width, height) = (320, 240);
    let shake = [(4, -2), (-3, 5), (7, 1), (-6, -4), (2, 6)];
    let anchor = scene(width, height, 0, 0);
    let frames: Vec<Frame> = shake
        .iter()
        .map(|&(dx, dy)| scene(width, height, dx, dy))
        .collect();

    std::fs::create_dir_all("demo_output")?;

    for (name, builder) in [
        ("fast", StabilizerBuilder::new().preset_fast()),
        ("balanced", StabilizerBuilder::new().preset_balanced()),
        ("precision", StabilizerBuilder::new().preset_precision()),
    ] {
        println!("⚙️  {}", builder.summary());
        let mut controller = builder.seed(7).build()?;
        controller.set_stabilize_source_image(anchor.clone());

        let start = Instant::now();
        let fixed = controller.stabilized_with_image_list(&frames)?;
        let fixed_time = start.elapsed();

        let start = Instant::now();
        let chained = controller.stabilized_with_prev_result(&frames)?;
        let chained_time = start.elapsed();

        println!("   fixed anchor:   {:?}", fixed_time);
        println!("   chained:        {:?}", chained_time);
        for (i, ((input, f), c)) in frames.iter().zip(&fixed).zip(&chained).enumerate() {
            println!(
                "   frame {}: error {:6.2} -> fixed {:5.2}, chained {:5.2}",
                i,
                interior_error(input, &anchor),
                interior_error(f, &anchor),
                interior_error(c, &anchor)
            );
        }

        for (i, frame) in fixed.iter().enumerate() {
            frame.save(format!("demo_output/{}_{}.png", name, i))?;
        }
        println!();
    }

    let controller = StabilizerBuilder::new().seed(7).build()?;
    controller
        .matched_feature(&frames[0], &anchor, 0)?
        .save("demo_output/matches.png")?;
    controller.compare_extractor(&frames);

    println!("✅ Outputs written to demo_output/");
    Ok(())
}
