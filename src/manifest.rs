//! Chip definition manifest (`chip.json`).
//!
//! Simulators read this file to draw the part and build its property panel:
//! the ordered pin list becomes the footprint and each control becomes a
//! slider bound to the attribute of the same id.

use crate::error::{ChipError, ChipResult, ResourceKind};
use crate::invariant_ppt::{assert_invariant, MANIFEST_CONSISTENT};
use crate::opamp::Channel;
use crate::sim::SimHost;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of property-panel control.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Slider between `min` and `max`.
    Range,
}

/// A user-editable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ControlKind,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Control {
    fn range(id: &str, label: &str, min: f32, max: f32, step: f32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind: ControlKind::Range,
            min,
            max,
            step,
        }
    }

    /// Whether `value` lies within the control's range.
    pub fn accepts(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Contents of a `chip.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipManifest {
    pub name: String,
    #[serde(default)]
    pub author: String,
    /// Footprint pins in package order; power pins included.
    pub pins: Vec<String>,
    #[serde(default)]
    pub controls: Vec<Control>,
}

impl ChipManifest {
    /// Manifest for [`crate::opamp::DualOpAmp`], laid out as an 8-pin dual op-amp package.
    pub fn dual_opamp() -> Self {
        let pins = [
            Channel::A.output_pin(),
            Channel::A.minus_pin(),
            Channel::A.plus_pin(),
            "GND",
            Channel::B.plus_pin(),
            Channel::B.minus_pin(),
            Channel::B.output_pin(),
            "VCC",
        ];
        let controls = Channel::ALL
            .iter()
            .flat_map(|&channel| {
                let suffix = match channel {
                    Channel::A => "A",
                    Channel::B => "B",
                };
                [
                    Control::range(
                        channel.gain_attr(),
                        &format!("Gain {}", suffix),
                        -100.0,
                        100.0,
                        0.1,
                    ),
                    Control::range(
                        channel.offset_attr(),
                        &format!("Offset {} (V)", suffix),
                        -5.0,
                        5.0,
                        0.01,
                    ),
                ]
            })
            .collect();
        Self {
            name: "Dual Op-Amp".to_string(),
            author: "dual-opamp".to_string(),
            pins: pins.iter().map(|p| p.to_string()).collect(),
            controls,
        }
    }

    pub fn from_json(json: &str) -> ChipResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> ChipResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ChipResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ChipResult<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn control(&self, id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.id == id)
    }

    /// Check that every pin and attribute a booted chip registered is declared here.
    pub fn validate(&self, host: &SimHost) -> ChipResult<()> {
        if let Some(pin) = host.pin_names().find(|p| !self.pins.iter().any(|d| d == p)) {
            return Err(ChipError::ManifestMismatch {
                kind: ResourceKind::Pin,
                name: pin.to_string(),
            });
        }
        if let Some(attr) = host.attr_names().find(|a| self.control(a).is_none()) {
            return Err(ChipError::ManifestMismatch {
                kind: ResourceKind::Attr,
                name: attr.to_string(),
            });
        }
        assert_invariant(
            MANIFEST_CONSISTENT,
            host.pin_names().count() <= self.pins.len(),
            "Manifest declares every registered pin",
            Some("ChipManifest::validate"),
        );
        Ok(())
    }
}

impl Default for ChipManifest {
    fn default() -> Self {
        Self::dual_opamp()
    }
}
