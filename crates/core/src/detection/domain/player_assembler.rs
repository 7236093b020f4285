use thiserror::Error;

use super::detector::{PartKind, RawDetection};
use super::player::{BodyPart, Confidence, Player};

/// Default pairing radius as a multiple of the body box diagonal.
pub const DEFAULT_PAIR_DISTANCE_SCALE: f64 = 1.0;

/// Non-fatal problems noticed while assembling a frame's detections.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AssemblyWarning {
    #[error("Dropped {kind:?} detection with invalid confidence {confidence}")]
    ConfidenceOutOfRange { kind: PartKind, confidence: f64 },
}

/// Result of assembling one frame: the players, plus any warnings
/// raised along the way.
#[derive(Debug, Default)]
pub struct Assembly {
    pub players: Vec<Player>,
    pub warnings: Vec<AssemblyWarning>,
}

/// Turns one frame's raw detections into assembled players.
///
/// Stateless: every call sees a single frame and carries nothing over.
/// Heads and bodies pair greedily by nearest centers, bounded by a
/// radius proportional to the body's diagonal (a head two body-lengths
/// away belongs to someone else). Leftovers become single-part players;
/// detections with invalid confidence are dropped with a warning.
#[derive(Clone, Debug)]
pub struct PlayerAssembler {
    pair_distance_scale: f64,
}

impl PlayerAssembler {
    pub fn new() -> Self {
        Self {
            pair_distance_scale: DEFAULT_PAIR_DISTANCE_SCALE,
        }
    }

    /// Overrides the pairing radius multiplier.
    pub fn with_pair_distance_scale(scale: f64) -> Self {
        Self {
            pair_distance_scale: scale,
        }
    }

    pub fn assemble(&self, detections: &[RawDetection]) -> Assembly {
        let mut warnings = Vec::new();
        let mut heads: Vec<BodyPart> = Vec::new();
        let mut bodies: Vec<BodyPart> = Vec::new();

        for det in detections {
            let confidence = match Confidence::new(det.confidence) {
                Ok(c) => c,
                Err(_) => {
                    warnings.push(AssemblyWarning::ConfidenceOutOfRange {
                        kind: det.kind,
                        confidence: det.confidence,
                    });
                    continue;
                }
            };
            let part = BodyPart::new(det.bounds, confidence);
            match det.kind {
                PartKind::Head => heads.push(part),
                PartKind::Body => bodies.push(part),
            }
        }

        Assembly {
            players: self.pair(heads, bodies),
            warnings,
        }
    }

    /// Greedy matching: globally closest head/body pairs win, each part
    /// used at most once.
    fn pair(&self, heads: Vec<BodyPart>, bodies: Vec<BodyPart>) -> Vec<Player> {
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (h, head) in heads.iter().enumerate() {
            let (hx, hy) = head.position().center();
            for (b, body) in bodies.iter().enumerate() {
                let (bx, by) = body.position().center();
                let dist = (hx - bx).hypot(hy - by);
                if dist <= self.pair_distance_scale * body.position().diagonal() {
                    candidates.push((dist, h, b));
                }
            }
        }
        // Ties break by input order so results are deterministic.
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut head_taken = vec![false; heads.len()];
        let mut body_taken = vec![false; bodies.len()];
        let mut players = Vec::new();

        for (_, h, b) in candidates {
            if head_taken[h] || body_taken[b] {
                continue;
            }
            head_taken[h] = true;
            body_taken[b] = true;
            players.extend(Player::from_parts(Some(heads[h]), Some(bodies[b])));
        }
        for (h, head) in heads.iter().enumerate() {
            if !head_taken[h] {
                players.extend(Player::from_parts(Some(*head), None));
            }
        }
        for (b, body) in bodies.iter().enumerate() {
            if !body_taken[b] {
                players.extend(Player::from_parts(None, Some(*body)));
            }
        }
        players
    }
}

impl Default for PlayerAssembler {
    fn default() -> Self {
        Self::new()
    }
}
