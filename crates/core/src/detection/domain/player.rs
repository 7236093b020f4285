use thiserror::Error;

use crate::shared::geometry::Rect;

/// Raised when a confidence value is non-finite or outside `[0, 1]`.
#[derive(Debug, Error, PartialEq)]
#[error("Confidence {value} is outside [0, 1]")]
pub struct InvalidConfidence {
    pub value: f64,
}

/// A detection confidence, guaranteed finite and within `[0, 1]`.
///
/// Out-of-range input is rejected at construction, never clamped; a
/// backend reporting 1.7 is lying, not over-confident.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, InvalidConfidence> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(InvalidConfidence { value });
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// One detected part of a player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyPart {
    position: Rect,
    confidence: Confidence,
}

impl BodyPart {
    pub fn new(position: Rect, confidence: Confidence) -> Self {
        Self {
            position,
            confidence,
        }
    }

    pub fn position(&self) -> Rect {
        self.position
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }
}

/// A player assembled from detected parts.
///
/// At least one part is always present: `from_parts` refuses to build
/// a part-less player.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    head: Option<BodyPart>,
    body: Option<BodyPart>,
    is_enemy: bool,
}

impl Player {
    /// Builds a player from its parts, or `None` when both are absent.
    pub fn from_parts(head: Option<BodyPart>, body: Option<BodyPart>) -> Option<Self> {
        if head.is_none() && body.is_none() {
            return None;
        }
        Some(Self {
            head,
            body,
            is_enemy: true,
        })
    }

    pub fn head(&self) -> Option<&BodyPart> {
        self.head.as_ref()
    }

    pub fn body(&self) -> Option<&BodyPart> {
        self.body.as_ref()
    }

    /// Without a friend-or-foe signal every detected player counts as
    /// hostile.
    pub fn is_enemy(&self) -> bool {
        self.is_enemy
    }
}
