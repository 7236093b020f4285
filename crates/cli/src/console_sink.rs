use std::path::PathBuf;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as DrawRect;

use spotter_core::detection::domain::player::Player;
use spotter_core::pipeline::frame_sink::FrameSink;
use spotter_core::shared::frame::Frame;
use spotter_core::shared::geometry::Rect;

const HEAD_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const BODY_COLOR: Rgb<u8> = Rgb([64, 255, 64]);

/// Prints a one-line status per tick and, when a snapshot directory is
/// configured, saves every Nth frame as a PNG with player bounds drawn
/// on it (heads red, bodies green).
pub struct ConsoleSink {
    snapshot_dir: Option<PathBuf>,
    snapshot_every: usize,
    presented: usize,
}

impl ConsoleSink {
    pub fn new(snapshot_dir: Option<PathBuf>, snapshot_every: usize) -> Self {
        Self {
            snapshot_dir,
            snapshot_every: snapshot_every.max(1),
            presented: 0,
        }
    }

    fn save_snapshot(
        &self,
        frame: &Frame,
        players: &[Player],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Some(dir) = &self.snapshot_dir else {
            return Ok(());
        };

        let mut image = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("frame buffer does not match its dimensions")?;
        for player in players {
            if let Some(head) = player.head() {
                draw_bounds(&mut image, head.position(), HEAD_COLOR);
            }
            if let Some(body) = player.body() {
                draw_bounds(&mut image, body.position(), BODY_COLOR);
            }
        }

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("tick_{:06}.png", frame.index()));
        image.save(&path)?;
        Ok(())
    }
}

impl FrameSink for ConsoleSink {
    fn present(
        &mut self,
        frame: &Frame,
        players: &[Player],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        eprint!("\rTick {:>6}: {} player(s)  ", frame.index(), players.len());

        if self.snapshot_dir.is_some() && self.presented % self.snapshot_every == 0 {
            self.save_snapshot(frame, players)?;
        }
        self.presented += 1;
        Ok(())
    }
}

fn draw_bounds(image: &mut RgbImage, bounds: Rect, color: Rgb<u8>) {
    // imageproc rejects zero-size rects; a degenerate box still gets a
    // visible marker.
    let rect = DrawRect::at(bounds.x_min(), bounds.y_min()).of_size(
        bounds.width().max(1) as u32,
        bounds.height().max(1) as u32,
    );
    draw_hollow_rect_mut(image, rect, color);
}
