//! Track a textured square moving over a noisy background, with an
//! occlusion in the middle of the sequence.
//!
//! Usage: `synthetic_sequence [frames]`

use tld::{GrayImage, Rect, Tld, TldConfig, TrackingState};

#[cfg(feature = "tracing")]
use tld::core::init_tracing;

const WIDTH: usize = 240;
const HEIGHT: usize = 180;
const SIZE: i32 = 40;

fn background(x: i32, y: i32) -> u8 {
    // cheap deterministic noise
    let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)) as u32;
    (40 + (h % 30)) as u8
}

fn render(frame: usize, occluded: bool) -> (GrayImage, Rect) {
    let x0 = 30 + 3 * frame as i32;
    let y0 = 60 + (frame as i32 % 10) - 5;
    let rect = Rect::new(x0, y0, SIZE, SIZE);
    let mut img = GrayImage::new(WIDTH, HEIGHT, 0);
    for y in 0..HEIGHT as i32 {
        for x in 0..WIDTH as i32 {
            let inside = x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom();
            let v = if inside && !occluded {
                let (u, v) = (x - rect.x, y - rect.y);
                if (u / 8 + v / 8) % 2 == 0 {
                    210
                } else {
                    110 + (u * 2) as u8
                }
            } else {
                background(x, y)
            };
            img.set(x as usize, y as usize, v);
        }
    }
    (img, rect)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    init_tracing(false, log::LevelFilter::Info);
    #[cfg(not(feature = "tracing"))]
    tld::core::init_with_level(log::LevelFilter::Info)?;

    let frames: usize = std::env::args()
        .nth(1)
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(40);

    let (first, truth) = render(0, false);
    let mut tld = Tld::new(WIDTH, HEIGHT, TldConfig::default())?;
    tld.select_object(&first.view(), truth)?;

    let mut hits = 0;
    for i in 1..frames {
        let occluded = (15..20).contains(&i);
        let (img, truth) = render(i, occluded);
        let result = tld.process_frame(&img.view())?;
        let score = result.bbox.map(|b| b.overlap(&truth)).unwrap_or(0.0);
        if !occluded && score >= 0.5 {
            hits += 1;
        }
        println!(
            "frame {i:3} {:>8} {:?} conf {:.2} overlap {:.2}{}",
            format!("{:?}", result.state),
            result.bbox,
            result.confidence,
            score,
            if occluded { " (occluded)" } else { "" }
        );
    }

    println!(
        "{hits} of {} visible frames overlap the truth by at least 0.5; final state {:?}",
        frames.saturating_sub(1) - (15..20).filter(|&i| i < frames).count(),
        tld.state()
    );
    if tld.state() == TrackingState::Uninitialized {
        return Err("tracker lost its model".into());
    }
    Ok(())
}
