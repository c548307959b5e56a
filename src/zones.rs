//! Age-relative heart-rate zones
//!
//! Static table of age brackets, each split into five contiguous BPM bands.
//! Lookup is an ordered range scan; anything outside the table has no zone.

use serde::Serialize;
use std::ops::RangeInclusive;

use crate::types::{Color, Zone, ZoneName};

const RESTING: Color = Color::from_rgb(0x4FC3F7);
const LIGHT: Color = Color::from_rgb(0x81C784);
const MODERATE: Color = Color::from_rgb(0xFFF176);
const HARD: Color = Color::from_rgb(0xFFA726);
const MAXIMUM: Color = Color::from_rgb(0xE57373);

/// One BPM band within an age bracket
#[derive(Debug, Clone, Serialize)]
pub struct ZoneBand {
    pub name: ZoneName,
    pub bpm: RangeInclusive<u32>,
    pub color: Color,
}

/// Zone bands for one age bracket
#[derive(Debug, Clone, Serialize)]
pub struct AgeBracket {
    pub ages: RangeInclusive<u32>,
    pub bands: [ZoneBand; 5],
}

const fn band(name: ZoneName, lo: u32, hi: u32, color: Color) -> ZoneBand {
    ZoneBand {
        name,
        bpm: lo..=hi,
        color,
    }
}

const fn bracket(ages: RangeInclusive<u32>, light: u32, moderate: u32, hard: u32, maximum: u32, top: u32) -> AgeBracket {
    AgeBracket {
        ages,
        bands: [
            band(ZoneName::Resting, 0, light - 1, RESTING),
            band(ZoneName::Light, light, moderate - 1, LIGHT),
            band(ZoneName::Moderate, moderate, hard - 1, MODERATE),
            band(ZoneName::Hard, hard, maximum - 1, HARD),
            band(ZoneName::Maximum, maximum, top, MAXIMUM),
        ],
    }
}

static AGE_BRACKETS: [AgeBracket; 6] = [
    bracket(20..=29, 60, 100, 140, 170, 200),
    bracket(30..=39, 60, 95, 133, 162, 190),
    bracket(40..=49, 60, 90, 126, 153, 180),
    bracket(50..=59, 60, 85, 119, 145, 170),
    bracket(60..=69, 60, 80, 112, 136, 160),
    bracket(70..=100, 60, 75, 105, 128, 150),
];

/// Read-only zone table
pub struct ZoneTable;

impl ZoneTable {
    /// Classify a BPM for a given age
    pub fn classify(age: u32, bpm: u32) -> Option<Zone> {
        let bracket = Self::bracket_for(age)?;
        bracket
            .bands
            .iter()
            .find(|band| band.bpm.contains(&bpm))
            .map(|band| Zone {
                name: band.name,
                color: band.color,
            })
    }

    /// Bracket covering `age`, if any
    pub fn bracket_for(age: u32) -> Option<&'static AgeBracket> {
        AGE_BRACKETS.iter().find(|bracket| bracket.ages.contains(&age))
    }

    pub fn brackets() -> &'static [AgeBracket] {
        &AGE_BRACKETS
    }
}
