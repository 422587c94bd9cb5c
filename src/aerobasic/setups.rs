//! Reusable program preambles and small motion snippets

use serde::{Deserialize, Serialize};

use crate::aerobasic::program::AeroBasicProgram;
use crate::aerobasic::{AeroBasic, Feed};
use crate::domain::axis::Axis;
use crate::domain::constants::{
    GalvoLaserOverrideMode, ProgrammingMode, VelocityMode, VelocityUnit, WaitMode,
};
use crate::domain::errors::DomainError;
use crate::domain::geometry::Coordinates;

/// Controller state every generated program starts from
pub fn default_setup(programming_mode: ProgrammingMode, velocity_mode: VelocityMode) -> AeroBasicProgram {
    let mut program = AeroBasicProgram::new();
    program.send("PRIMARY");
    program.send(VelocityUnit::Seconds.as_str());
    program.send(programming_mode.as_str());
    program.velocity(velocity_mode);
    program.send("IFOV OFF");
    program
}

/// Infinite Field of View: galvo A/B tracks stage X/Y
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IfovSetup {
    pub size: f64,
    pub time: f64,
    pub tracking_speed: f64,
    pub tracking_acceleration: f64,
}

impl Default for IfovSetup {
    fn default() -> Self {
        Self {
            size: 0.5,
            time: 10.0,
            tracking_speed: 500.0,
            tracking_acceleration: 500.0,
        }
    }
}

impl IfovSetup {
    pub fn program(&self) -> AeroBasicProgram {
        let mut program = AeroBasicProgram::new();

        program.comment("\nTurn off IFOV until setup is completed");
        program.send("IFOV OFF");

        program.comment("\nSet Galvo Delays and mode");
        program.send("GALVO LASERONDELAY A 0");
        program.send("GALVO LASEROFFDELAY A 0");
        program.send("GALVO LASERMODE A 0");

        program.comment("\nSynchronize axes");
        program.send("IFOV AXISPAIR 0, A, X");
        program.send("IFOV AXISPAIR 1, B, Y");
        program.send("ENCODER OUT X ON 0,0");
        program.send("ENCODER OUT Y ON 0,0");
        program.send("IFOV SYNCAXES Z");

        program.comment("\nIFOV Settings");
        program.send(&format!("IFOV SIZE {:.6}", self.size));
        program.send(&format!("IFOV TIME {:.6}", self.time));
        program.send(&format!("IFOV TRACKINGSPEED {:.6}", self.tracking_speed));
        program.send(&format!("IFOV TRACKINGACCEL {:.6}", self.tracking_acceleration));

        program.comment("\nTurn on IFOV");
        program.send("IFOV ON");
        program
    }
}

/// Vertical line exposed with the galvo laser override, relative to the current position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZLine {
    pub dz: f64,
    pub fast_speed: f64,
    pub slow_speed: f64,
}

impl ZLine {
    pub fn new(dz: f64, fast_speed: f64, slow_speed: f64) -> Self {
        Self {
            dz,
            fast_speed,
            slow_speed,
        }
    }

    pub fn program(&self) -> Result<AeroBasicProgram, DomainError> {
        if self.fast_speed <= 0.0 || self.slow_speed <= 0.0 {
            return Err(DomainError::BadArgs(format!(
                "ZLine speeds must be positive (fast={}, slow={})",
                self.fast_speed, self.slow_speed
            )));
        }

        let half = -self.dz / 2.0;
        let mut program = AeroBasicProgram::new();
        program.comment("Setup");
        program.send("LOOKAHEAD FAST");
        program.critical_section(|p| -> Result<(), DomainError> {
            p.velocity(VelocityMode::On);
            p.send("RAMP MODE RATE");
            p.send("RAMP RATE 0.00000");
            p.wait_mode(WaitMode::Auto);
            p.incremental();

            p.comment("\nDraw Line");
            p.linear(
                &Coordinates::new().with(Axis::Z, half),
                Some(Feed::Dependent(self.fast_speed)),
            );
            p.galvo_laser_override(Axis::A, GalvoLaserOverrideMode::On)?;
            p.linear(
                &Coordinates::new().with(Axis::Z, self.dz),
                Some(Feed::Dependent(self.slow_speed)),
            );
            p.galvo_laser_override(Axis::A, GalvoLaserOverrideMode::Off)?;
            p.linear(
                &Coordinates::new().with(Axis::Z, half),
                Some(Feed::Dependent(self.fast_speed)),
            );
            Ok(())
        })?;

        program.comment("\nReturn to absolute coordinates");
        program.absolute();
        Ok(program)
    }
}
