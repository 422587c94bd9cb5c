// Controller constants - Return codes, data items, status words and modes

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Number of tasks the A3200 controller provides
pub const MAX_NUMBER_OF_TASKS: u8 = 32;

/// First character of every ASCII interface response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReturnCode {
    Success,
    Invalid,
    Fault,
}

impl ReturnCode {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '%' => Some(ReturnCode::Success),
            '!' => Some(ReturnCode::Invalid),
            '#' => Some(ReturnCode::Fault),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            ReturnCode::Success => '%',
            ReturnCode::Invalid => '!',
            ReturnCode::Fault => '#',
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnCode::Success => "SUCCESS",
            ReturnCode::Invalid => "INVALID",
            ReturnCode::Fault => "FAULT",
        };
        write!(f, "{}", name)
    }
}

/// Controller software version (MAJOR.MINOR.REVISION.BUILD)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: String,
    pub minor: String,
    pub revision: String,
    pub build: String,
}

impl FromStr for Version {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [major, minor, revision, build] => Ok(Version {
                major: major.to_string(),
                minor: minor.to_string(),
                revision: revision.to_string(),
                build: build.to_string(),
            }),
            _ => Err(DomainError::Protocol(format!(
                "Version must have four parts, got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.revision, self.build
        )
    }
}

/// Anything that can be queried through a `*STATUS` command
pub trait DataItem {
    /// Bare item name as used by `~STATUS`
    fn name(&self) -> &'static str;

    /// Item name as used by AeroBasic status functions
    fn as_dataitem(&self) -> String {
        format!("DATAITEM_{}", self.name())
    }
}

macro_rules! data_items {
    ($(#[$meta:meta])* $enum_name:ident { $($item:ident),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $($item),*
        }

        impl $enum_name {
            pub const ALL: &'static [$enum_name] = &[$($enum_name::$item),*];
        }

        impl DataItem for $enum_name {
            fn name(&self) -> &'static str {
                match self {
                    $($enum_name::$item => stringify!($item)),*
                }
            }
        }

        impl FromStr for $enum_name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bare = s.strip_prefix("DATAITEM_").unwrap_or(s);
                $enum_name::ALL
                    .iter()
                    .copied()
                    .find(|item| item.name().eq_ignore_ascii_case(bare))
                    .ok_or_else(|| DomainError::BadArgs(format!(
                        "Unknown {} '{}'", stringify!($enum_name), s
                    )))
            }
        }
    };
}

data_items!(
    /// Per-axis status items
    AxisStatusDataItem {
        AccelerationCommand, AccelerationCommandRaw, AccelerationError, AccelerationFeedback,
        AccelerationMode, AccelerationRate, AccelerationTime, AccelerationType,
        AccuracyCorrectionEndingPosition, AccuracyCorrectionStartingPosition,
        AnalogInput0, AnalogInput1, AnalogInput2, AnalogInput3,
        AnalogOutput0, AnalogOutput1, AnalogOutput2, AnalogOutput3,
        AxisFault, AxisParameter, AxisStatus, Backlash, CommunicationRealTimeErrors,
        CoordinatedDistanceRemaining, CoordinatedPositionTarget,
        CurrentCommand, CurrentError, CurrentFeedback, CurrentFeedbackAverage,
        DecelerationMode, DecelerationRate, DecelerationTime, DecelerationType,
        DigitalInput, DigitalOutput, DistanceLog, DriveStatus, FixtureOffset,
        GalvoLaserOffDelay, GalvoLaserOnDelay, GalvoLaserOutputRaw, JerkCommandRaw,
        PeakCurrent, PiezoVoltageCommand, PiezoVoltageFeedback,
        PositionCalibration2D, PositionCalibrationAll, PositionCommand, PositionCommandRaw,
        PositionCommandRollover, PositionError, PositionFeedback, PositionFeedbackAuxiliary,
        PositionFeedbackAuxiliaryRollover, PositionFeedbackRollover, PositionOffset,
        ProgramPosition, ProgramPositionCommand, ProgramPositionFeedback,
        ProgramVelocityCommand, ProgramVelocityFeedback, SpeedTarget, SpeedTargetActual,
        Stability0SettleTime, Stability1SettleTime, STOStatus, TotalMoveTime,
        VelocityCommand, VelocityCommandRaw, VelocityError, VelocityFeedback,
        VelocityFeedbackAverage,
    }
);

data_items!(
    /// Per-task status items
    TaskStatusDataItem {
        ActiveFixtureOffset, CoordinateSystem1I, CoordinateSystem1J, CoordinateSystem1K,
        CoordinateSystem1Plane, CoordinatedAccelerationCommand, CoordinatedAccelerationRate,
        CoordinatedAccelerationTime, CoordinatedDecelerationRate, CoordinatedDecelerationTime,
        CoordinatedPercentDone, CoordinatedPositionCommand, CoordinatedSpeedCommand,
        CoordinatedSpeedTarget, CoordinatedSpeedTargetActual, CoordinatedTotalDistance,
        CriticalSectionActive, DependentCoordinatedSpeedTarget,
        DependentCoordinatedSpeedTargetActual, EnableAlignmentAxes, ExecutionMode,
        FiberPower, FiberPowerSampleCount, FiberSearchResult, IFOVSpeedScale, MFO,
        MotionLineNumber, ProgramLineNumber, ProgramLineNumberInternal, ProgramPersistent,
        ProgramVariable, QueueLineCapacity, QueueLineCount, QueueStatus,
        Spindle0SpeedTarget, Spindle1SpeedTarget, Spindle2SpeedTarget, Spindle3SpeedTarget,
        TaskDoubleVariable, TaskErrorCode, TaskErrorLocation, TaskExecutionLines,
        TaskExecutionLinesMaximum, TaskExecutionTime, TaskExecutionTimeMaximum,
        TaskInfoVariable, TaskMode, TaskParameter, TaskReturnVariable, TaskState,
        TaskStateInternal, TaskStatus0, TaskStatus1, TaskStatus2, TaskWarningCode,
        TaskWarningLocation, ToolNumberActive,
    }
);

data_items!(
    /// Controller-wide status items
    SystemStatusDataItem {
        DataCollectionSampleIndex, DataCollectionSampleTime, DataCollectionStatus,
        EstimatedProcessorUsage, FieldbusConnected, FieldbusErrorCode, FieldbusErrorLocation,
        GlobalVariable, PCModbusMasterConnected, PCModbusMasterErrorCode,
        PCModbusMasterErrorLocation, PCModbusSlaveConnected, PCModbusSlaveErrorCode,
        PCModbusSlaveErrorLocation, SafeZoneActiveMask, SafeZoneViolationMask,
        SystemParameter, ThermoCompStatus, Timer, TimerPerformance, VirtualBinaryInput,
        VirtualBinaryOutput, VirtualRegisterInput, VirtualRegisterOutput,
        ZYGOPosition1, ZYGOPosition2, ZYGOPosition3, ZYGOPosition4,
    }
);

/// Execution state of a controller task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Unavailable = 0,
    Inactive = 1,
    Idle = 2,
    ProgramReady = 3,
    ProgramRunning = 4,
    ProgramFeedHeld = 5,
    ProgramPaused = 6,
    ProgramComplete = 7,
    Error = 8,
    Queue = 9,
}

impl TaskState {
    pub fn from_code(code: i64) -> Result<Self, DomainError> {
        let state = match code {
            0 => TaskState::Unavailable,
            1 => TaskState::Inactive,
            2 => TaskState::Idle,
            3 => TaskState::ProgramReady,
            4 => TaskState::ProgramRunning,
            5 => TaskState::ProgramFeedHeld,
            6 => TaskState::ProgramPaused,
            7 => TaskState::ProgramComplete,
            8 => TaskState::Error,
            9 => TaskState::Queue,
            _ => {
                return Err(DomainError::Protocol(format!(
                    "Unknown task state {}",
                    code
                )))
            }
        };
        Ok(state)
    }
}

bitflags! {
    /// Axis status word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AxisStatus: u32 {
        const Homed = 0x0000_0001;
        const Profiling = 0x0000_0002;
        const WaitDone = 0x0000_0004;
        const CommandValid = 0x0000_0008;
        const Homing = 0x0000_0010;
        const Enabling = 0x0000_0020;
        const JogGenerating = 0x0000_0080;
        const Jogging = 0x0000_0100;
        const DrivePending = 0x0000_0200;
        const DriveAbortPending = 0x0000_0400;
        const TrajectoryFiltering = 0x0000_0800;
        const IFOVEnabled = 0x0000_1000;
        const NotVirtual = 0x0000_2000;
        const CalEnabled1D = 0x0000_4000;
        const CalEnabled2D = 0x0000_8000;
        const MasterSlaveControl = 0x0001_0000;
        const JoystickControl = 0x0002_0000;
        const BacklashActive = 0x0004_0000;
        const GainMappingEnabled = 0x0008_0000;
        const Stability0 = 0x0010_0000;
        const MotionBlocked = 0x0020_0000;
        const MoveDone = 0x0040_0000;
        const MotionClamped = 0x0080_0000;
        const GantryAligned = 0x0100_0000;
        const GantryRealigning = 0x0200_0000;
        const Stability1 = 0x0400_0000;
        const ThermoCompEnabled = 0x0800_0000;
    }

    /// Drive status word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriveStatus: u32 {
        const Enabled = 0x0000_0001;
        const CwEOTLimit = 0x0000_0002;
        const CcwEOTLimit = 0x0000_0004;
        const HomeLimit = 0x0000_0008;
        const MarkerInput = 0x0000_0010;
        const HallAInput = 0x0000_0020;
        const HallBInput = 0x0000_0040;
        const HallCInput = 0x0000_0080;
        const SineEncoderError = 0x0000_0100;
        const CosineEncoderError = 0x0000_0200;
        const ESTOPInput = 0x0000_0400;
        const BrakeOutput = 0x0000_0800;
        const GalvoPowerCorrection = 0x0000_1000;
        const NoMotorSupply = 0x0000_4000;
        const CurrentClamp = 0x0000_8000;
        const MarkerLatch = 0x0001_0000;
        const PowerLimiting = 0x0002_0000;
        const PSOHaltLatch = 0x0004_0000;
        const HighResMode = 0x0008_0000;
        const GalvoCalEnabled = 0x0010_0000;
        const AutofocusActive = 0x0020_0000;
        const ProgramFlash = 0x0040_0000;
        const ProgramMXH = 0x0080_0000;
        const ServoControl = 0x0100_0000;
        const InPosition = 0x0200_0000;
        const MoveActive = 0x0400_0000;
        const AccelPhase = 0x0800_0000;
        const DecelPhase = 0x1000_0000;
        const EncoderClipping = 0x2000_0000;
        const DualLoopActive = 0x4000_0000;
        const InPosition2 = 0x8000_0000;
    }

    /// Axis fault word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AxisFault: u32 {
        const PositionError = 0x0000_0001;
        const OverCurrent = 0x0000_0002;
        const CwEOTLimit = 0x0000_0004;
        const CcwEOTLimit = 0x0000_0008;
        const CwSoftLimit = 0x0000_0010;
        const CcwSoftLimit = 0x0000_0020;
        const AmplifierFault = 0x0000_0040;
        const PositionFbk = 0x0000_0080;
        const VelocityFbk = 0x0000_0100;
        const HallFault = 0x0000_0200;
        const MaxVelocity = 0x0000_0400;
        const EstopFault = 0x0000_0800;
        const VelocityError = 0x0000_1000;
        const ProbingFault = 0x0000_4000;
        const ExternalFault = 0x0000_8000;
        const MotorTemp = 0x0002_0000;
        const AmplifierTemp = 0x0004_0000;
        const EncoderFault = 0x0008_0000;
        const CommLost = 0x0010_0000;
        const GantryMisalign = 0x0040_0000;
        const FbkScalingFault = 0x0080_0000;
        const MrkSearchFault = 0x0100_0000;
        const SafeZoneFault = 0x0200_0000;
        const InPosTimeout = 0x0400_0000;
        const VoltageClamp = 0x0800_0000;
        const PowerSupply = 0x1000_0000;
        const MissedInterrupt = 0x2000_0000;
        const Internal = 0x4000_0000;
    }

    /// Task mode word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskMode: u32 {
        const Secondary = 0x0000_0001;
        const Absolute = 0x0000_0002;
        const AccelTypeLinear = 0x0000_0004;
        const AccelModeRate = 0x0000_0008;
        const InverseDominance = 0x0000_0010;
        const MotionContinuous = 0x0000_0020;
        const InverseCircular = 0x0000_0040;
        const SpindleStopOnProgramHalt = 0x0000_0080;
        const BlockDelete = 0x0000_0100;
        const OptionalPause = 0x0000_0200;
        const AccelTypeScurve = 0x0000_0400;
        const MFOLock = 0x0000_0800;
        const MSOLock = 0x0000_1000;
        const DecelTypeLinear = 0x0000_2000;
        const DecelTypeScurve = 0x0000_4000;
        const AutoMode = 0x0000_8000;
        const ProgramFeedRateMPU = 0x0001_0000;
        const ProgramFeedRateUPR = 0x0002_0000;
        const BlockDelete2 = 0x0040_0000;
        const OverMode = 0x0080_0000;
        const DecelModeRate = 0x0100_0000;
        const MFOActiveOnJog = 0x0400_0000;
        const WaitForInPos = 0x0800_0000;
        const Minutes = 0x1000_0000;
        const WaitAuto = 0x4000_0000;
    }

    /// Task status word 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskStatus0: u32 {
        const ProgramAssociated = 0x0000_0001;
        const ImmediateConcurrent = 0x0000_0004;
        const ImmediateExecuting = 0x0000_0008;
        const ReturnMotionExecuting = 0x0000_0010;
        const SingleStepInto = 0x0000_0040;
        const SingleStepOver = 0x0000_0080;
        const ProgramReset = 0x0000_0100;
        const PendingAxesStop = 0x0000_0200;
        const SoftwareESTOPActive = 0x0000_0400;
        const FeedHoldActive = 0x0000_0800;
        const CallbackHoldActive = 0x0000_1000;
        const CallbackResponding = 0x0000_2000;
        const SpindleActive0 = 0x0000_4000;
        const SpindleActive1 = 0x0000_8000;
        const SpindleActive2 = 0x0001_0000;
        const SpindleActive3 = 0x0002_0000;
        const ProbingCycle = 0x0004_0000;
        const Retrace = 0x0008_0000;
        const SoftHomeActive = 0x0010_0000;
        const InterruptMotionActive = 0x0020_0000;
        const JoystickActive = 0x0040_0000;
        const CornerRounding = 0x0080_0000;
        const JoystickLowSpeedActive = 0x0200_0000;
        const CannedFunctionExecuting = 0x0800_0000;
        const ProgramControlRestricted = 0x2000_0000;
    }

    /// Task status word 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskStatus1: u32 {
        const MotionModeAbsOffsets = 0x0000_0001;
        const AsyncSMCMotionAbortPending = 0x0000_0002;
        const RetraceRequested = 0x0000_0008;
        const MSOChange = 0x0000_0010;
        const SpindleFeedHeld = 0x0000_0020;
        const FeedHeldAxesStopped = 0x0000_0040;
        const CutterRadiusEnabling = 0x0000_0080;
        const CutterRadiusDisabling = 0x0000_0100;
        const CutterOffsetsEnablingPos = 0x0000_0200;
        const CutterOffsetsEnablingNeg = 0x0000_0400;
        const CutterOffsetsDisabling = 0x0000_0800;
        const OnGosubPending = 0x0000_8000;
        const ProgramStopPending = 0x0001_0000;
        const CannedFunctionPending = 0x0002_0000;
        const NoMFOFloor = 0x0004_0000;
        const Interrupted = 0x0008_0000;
        const GalvoIFVDeactivationPending = 0x0100_0000;
        const IFOVBufferHold = 0x0200_0000;
    }

    /// Task status word 2
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskStatus2: u32 {
        const RotationActive = 0x0000_0001;
        const RThetaPolarActive = 0x0000_0002;
        const RThetaCylindricalActive = 0x0000_0004;
        const ScalingActive = 0x0000_0008;
        const OffsetFixtureActive = 0x0000_0010;
        const ProfileActive = 0x0000_0020;
        const MotionModeRapid = 0x0000_0040;
        const MotionModeCoordinated = 0x0000_0080;
        const MotionPVT = 0x0000_0100;
        const MotionContinuousActive = 0x0000_0200;
        const MotionFiber = 0x0000_0800;
        const CutterOffsetsActivePos = 0x0000_1000;
        const CutterRadiusActiveLeft = 0x0000_2000;
        const CutterRadiusActiveRight = 0x0000_4000;
        const CutterOffsetsActiveNeg = 0x0000_8000;
        const NormalcyActiveLeft = 0x0001_0000;
        const NormalcyActiveRight = 0x0002_0000;
        const NormalcyAlignment = 0x0004_0000;
        const MotionModeCW = 0x0008_0000;
        const MotionModeCCW = 0x0010_0000;
        const LimitFeedRateActive = 0x0020_0000;
        const LimitMFOActive = 0x0040_0000;
        const Coord1Plane1 = 0x0080_0000;
        const Coord1Plane2 = 0x0100_0000;
        const Coord1Plane3 = 0x0200_0000;
        const Coord2Plane1 = 0x0400_0000;
        const Coord2Plane2 = 0x0800_0000;
        const Coord2Plane3 = 0x1000_0000;
        const MirrorActive = 0x4000_0000;
    }
}

/// Parse a status word as sent by the controller ("1073741826" or "1073741826.000000")
pub fn parse_status_word(text: &str) -> Result<u32, DomainError> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<u32>() {
        return Ok(value);
    }
    let value: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| DomainError::Protocol(format!("Cannot parse status word '{}'", text)))?;
    if value < 0.0 || value > u32::MAX as f64 {
        return Err(DomainError::Protocol(format!(
            "Status word out of range: '{}'",
            text
        )));
    }
    Ok(value as u32)
}

/// The three task status words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatus {
    pub status0: TaskStatus0,
    pub status1: TaskStatus1,
    pub status2: TaskStatus2,
}

impl TaskStatus {
    pub fn from_strings(status0: &str, status1: &str, status2: &str) -> Result<Self, DomainError> {
        Ok(Self {
            status0: TaskStatus0::from_bits_retain(parse_status_word(status0)?),
            status1: TaskStatus1::from_bits_retain(parse_status_word(status1)?),
            status2: TaskStatus2::from_bits_retain(parse_status_word(status2)?),
        })
    }
}

/// Generates a keyword enum with its AeroBasic spelling
macro_rules! keyword_enum {
    ($(#[$meta:meta])* $enum_name:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $enum_name {
            $(#[serde(rename = $text)] $variant),*
        }

        impl $enum_name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($enum_name::$variant => $text),*
                }
            }
        }

        impl fmt::Display for $enum_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $enum_name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($enum_name::$variant),)*
                    _ => Err(DomainError::BadArgs(format!(
                        "Unknown {} '{}'", stringify!($enum_name), s
                    ))),
                }
            }
        }
    };
}

keyword_enum!(
    /// Interpretation of coordinates in motion commands
    ProgrammingMode { Absolute => "ABSOLUTE", Incremental => "INCREMENTAL" }
);

keyword_enum!(
    /// Velocity profiling between consecutive moves
    VelocityMode { On => "ON", Off => "OFF" }
);

keyword_enum!(
    /// Time base of feed rates
    VelocityUnit { Seconds => "SECONDS", Minutes => "MINUTES" }
);

keyword_enum!(
    /// When a move counts as finished
    WaitMode { Auto => "AUTO", InPosition => "INPOS", MoveDone => "MOVEDONE" }
);

keyword_enum!(
    /// Galvo laser override state
    GalvoLaserOverrideMode { On => "ON", Off => "OFF" }
);

keyword_enum!(
    /// Degree of a BEZIER curve
    BezierMode { Quadratic => "QUADRATIC", Cubic => "CUBIC" }
);

keyword_enum!(
    /// Sense of rotation for circular moves
    CircleDirection { Clockwise => "CW", CounterClockwise => "CCW" }
);

impl WaitMode {
    pub fn from_task_mode(task_mode: TaskMode) -> Self {
        if task_mode.contains(TaskMode::WaitAuto) {
            WaitMode::Auto
        } else if task_mode.contains(TaskMode::WaitForInPos) {
            WaitMode::InPosition
        } else {
            WaitMode::MoveDone
        }
    }
}

impl Default for CircleDirection {
    fn default() -> Self {
        CircleDirection::Clockwise
    }
}

impl From<bool> for GalvoLaserOverrideMode {
    fn from(on: bool) -> Self {
        if on {
            GalvoLaserOverrideMode::On
        } else {
            GalvoLaserOverrideMode::Off
        }
    }
}
