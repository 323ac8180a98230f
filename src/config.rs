//! Tracer configuration: the numeric knobs the pipeline needs, loaded from
//! TOML or built up incrementally through [`ConfigBuilder`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const OFFSET_DOMAIN: f32 = 2.0; // offset bin spans [-1.0, 1.0]

/// All caller-provided numeric constants the tracer needs. Nothing here is
/// learned or fit; every field is supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub angle_step: f32,
    pub offset_step: f32,
    pub width_min: f32,
    pub width_max: f32,
    pub width_step: f32,
    pub tlen: u32,
    pub min_signal: f32,
    pub lattice_spacing: u32,
    pub maxr: u32,
    pub maxiter: u32,
    pub iteration_thres: f32,
    pub accum_thres: f32,
    pub seed_thres: f32,
    pub half_space_asymmetry: f32,
    pub half_space_tunneling_max_moves: u32,
    pub max_delta_angle: f32,
    pub max_delta_width: f32,
    pub max_delta_offset: f32,
    pub min_length: u32,
    pub redundancy_thres: f32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            angle_step: 18.0,
            offset_step: 0.1,
            width_min: 0.4,
            width_max: 3.0,
            width_step: 0.2,
            tlen: 8,
            min_signal: 5.0,
            lattice_spacing: 8,
            maxr: 4,
            maxiter: 10,
            iteration_thres: 0.5,
            accum_thres: 0.5,
            seed_thres: 0.5,
            half_space_asymmetry: 0.25,
            half_space_tunneling_max_moves: 50,
            max_delta_angle: 10.1,
            max_delta_width: 6.0,
            max_delta_offset: 6.0,
            min_length: 10,
            redundancy_thres: 20.0,
        }
    }
}

impl Config {
    /// Side of the square detector support, `2*tlen + 3`.
    pub fn support_size(&self) -> usize {
        2 * self.tlen as usize + 3
    }

    pub fn from_path(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field validation pass, run once by [`ConfigBuilder::build`]
    /// and again by [`Config::from_path`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("angle_step", self.angle_step)?;
        positive("offset_step", self.offset_step)?;
        positive("width_step", self.width_step)?;
        positive("min_signal", self.min_signal)?;
        positive("iteration_thres", self.iteration_thres)?;
        positive("accum_thres", self.accum_thres)?;
        positive("seed_thres", self.seed_thres)?;
        positive("half_space_asymmetry", self.half_space_asymmetry)?;
        positive("max_delta_angle", self.max_delta_angle)?;
        positive("max_delta_width", self.max_delta_width)?;
        positive("max_delta_offset", self.max_delta_offset)?;
        positive("redundancy_thres", self.redundancy_thres)?;

        if self.tlen == 0 {
            return Err(ConfigError::NotPositive { field: "tlen", value: 0.0 });
        }
        if self.lattice_spacing == 0 {
            return Err(ConfigError::NotPositive {
                field: "lattice_spacing",
                value: 0.0,
            });
        }
        if self.maxr == 0 {
            return Err(ConfigError::NotPositive { field: "maxr", value: 0.0 });
        }
        if self.maxiter == 0 {
            return Err(ConfigError::NotPositive {
                field: "maxiter",
                value: 0.0,
            });
        }

        if self.width_max <= self.width_min {
            return Err(ConfigError::OutOfRange {
                field: "width_max",
                value: self.width_max,
                min: self.width_min,
                max: f32::INFINITY,
            });
        }

        step_divides("offset_step", self.offset_step, "offset", OFFSET_DOMAIN)?;
        step_divides(
            "width_step",
            self.width_step,
            "width",
            self.width_max - self.width_min,
        )?;

        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value <= 0.0 {
        Err(ConfigError::NotPositive { field, value })
    } else {
        Ok(())
    }
}

fn step_divides(
    step_field: &'static str,
    step: f32,
    range_field: &'static str,
    range: f32,
) -> Result<(), ConfigError> {
    let steps = range / step;
    if (steps - steps.round()).abs() > 1e-3 {
        return Err(ConfigError::StepMisaligned {
            range_field,
            step_field,
            min: 0.0,
            max: range,
            step,
        });
    }
    Ok(())
}

/// Incrementally builds a validated [`Config`]. Each `with_*` setter
/// validates eagerly and returns an error rather than panicking, since this
/// crate has no GUI layer upstream to catch a panic on the caller's behalf.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

macro_rules! with_positive_f32 {
    ($name:ident, $field:ident) => {
        pub fn $name(&mut self, value: f32) -> Result<&mut Self, ConfigError> {
            positive(stringify!($field), value)?;
            self.config.$field = value;
            Ok(self)
        }
    };
}

macro_rules! with_positive_u32 {
    ($name:ident, $field:ident) => {
        pub fn $name(&mut self, value: u32) -> Result<&mut Self, ConfigError> {
            if value == 0 {
                return Err(ConfigError::NotPositive {
                    field: stringify!($field),
                    value: 0.0,
                });
            }
            self.config.$field = value;
            Ok(self)
        }
    };
}

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder::default()
    }

    with_positive_f32!(with_angle_step, angle_step);
    with_positive_f32!(with_offset_step, offset_step);
    with_positive_f32!(with_width_step, width_step);
    with_positive_f32!(with_min_signal, min_signal);
    with_positive_f32!(with_iteration_thres, iteration_thres);
    with_positive_f32!(with_accum_thres, accum_thres);
    with_positive_f32!(with_seed_thres, seed_thres);
    with_positive_f32!(with_half_space_asymmetry, half_space_asymmetry);
    with_positive_f32!(with_max_delta_angle, max_delta_angle);
    with_positive_f32!(with_max_delta_width, max_delta_width);
    with_positive_f32!(with_max_delta_offset, max_delta_offset);
    with_positive_f32!(with_redundancy_thres, redundancy_thres);

    with_positive_u32!(with_tlen, tlen);
    with_positive_u32!(with_lattice_spacing, lattice_spacing);
    with_positive_u32!(with_maxr, maxr);
    with_positive_u32!(with_maxiter, maxiter);
    with_positive_u32!(with_half_space_tunneling_max_moves, half_space_tunneling_max_moves);
    with_positive_u32!(with_min_length, min_length);

    pub fn with_width_range(&mut self, min: f32, max: f32) -> Result<&mut Self, ConfigError> {
        if max <= min {
            return Err(ConfigError::OutOfRange {
                field: "width_max",
                value: max,
                min,
                max: f32::INFINITY,
            });
        }
        self.config.width_min = min;
        self.config.width_max = max;
        Ok(self)
    }

    pub fn build(&self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_tlen() {
        let mut cfg = Config::default();
        cfg.tlen = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::NotPositive { field: "tlen", .. })));
    }

    #[test]
    fn rejects_misaligned_width_step() {
        let mut cfg = Config::default();
        cfg.width_step = 0.3; // (3.0 - 0.4) / 0.3 is not an integer
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::StepMisaligned { step_field: "width_step", .. })
        ));
    }

    #[test]
    fn builder_roundtrips_through_toml() {
        let cfg = ConfigBuilder::new()
            .with_tlen(8)
            .unwrap()
            .with_angle_step(18.0)
            .unwrap()
            .build()
            .unwrap();
        let toml_text = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&toml_text).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn builder_rejects_zero_maxr() {
        let mut builder = ConfigBuilder::new();
        assert!(builder.with_maxr(0).is_err());
    }

    #[test]
    fn support_size_matches_formula() {
        let mut cfg = Config::default();
        cfg.tlen = 8;
        assert_eq!(cfg.support_size(), 19);
    }
}
