//! Protocol vocabulary: parameter identifiers and device status codes
//!
//! The wire protocol names parameters with mixed-case tokens (e.g.
//! `eyeLeft_isOpen`). The full published vocabulary is closed; unknown tokens
//! map to [`ParameterId::NotAParameter`] and are dropped before a sample is
//! stored.

macro_rules! parameter_vocabulary {
    ($($(#[$meta:meta])* $variant:ident => $wire:literal,)+) => {
        /// A telemetry field recognized by the NITH protocol.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ParameterId {
            $($(#[$meta])* $variant,)+
            /// Sentinel for unrecognized field names
            NotAParameter,
        }

        impl ParameterId {
            /// Map a wire token to its parameter id.
            ///
            /// Unknown tokens yield [`ParameterId::NotAParameter`].
            pub fn from_wire(token: &str) -> Self {
                match token {
                    $($wire => Self::$variant,)+
                    _ => Self::NotAParameter,
                }
            }

            /// The wire token for this parameter.
            pub fn as_wire(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::NotAParameter => "NaP",
                }
            }
        }
    };
}

parameter_vocabulary! {
    // Eyes
    /// Left eye aperture (continuous)
    EyeLeftAperture => "eyeLeft_ape",
    /// Right eye aperture (continuous)
    EyeRightAperture => "eyeRight_ape",
    /// Left eye open status (boolean)
    EyeLeftIsOpen => "eyeLeft_isOpen",
    /// Right eye open status (boolean)
    EyeRightIsOpen => "eyeRight_isOpen",
    EyeLeftPosX => "eyeLeft_pos_x",
    EyeLeftPosY => "eyeLeft_pos_y",
    EyeLeftPosZ => "eyeLeft_pos_z",
    EyeRightPosX => "eyeRight_pos_x",
    EyeRightPosY => "eyeRight_pos_y",
    EyeRightPosZ => "eyeRight_pos_z",
    EyeLeftAngX => "eyeLeft_ang_x",
    EyeLeftAngY => "eyeLeft_ang_y",
    EyeRightAngX => "eyeRight_ang_x",
    EyeRightAngY => "eyeRight_ang_y",
    EyeLeftBrowHeight => "eyeLeft_brow_height",
    EyeRightBrowHeight => "eyeRight_brow_height",
    /// Left eyebrow phase (-1: down, 0: neutral, 1: up)
    EyeLeftBrowPhase => "eyeLeft_brow_phase",
    /// Right eyebrow phase (-1: down, 0: neutral, 1: up)
    EyeRightBrowPhase => "eyeRight_brow_phase",
    EyesPresence => "eyes_presence",
    GazeX => "gaze_x",
    GazeY => "gaze_y",
    GazePresence => "gaze_presence",

    // Mouth
    VoicePitch => "voice_pitch",
    VoiceIntensity => "voice_intensity",
    WhistlePitch => "whistle_pitch",
    WhistleIntensity => "whistle_intensity",
    /// Breath pressure from a sip/puff or pressure sensor
    BreathPressure => "breath_press",
    /// Mouth aperture (continuous)
    MouthAperture => "mouth_ape",
    MouthHeight => "mouth_height",
    MouthWidth => "mouth_width",
    MouthIsOpen => "mouth_isOpen",
    TeethPressure => "teeth_press",
    JawX => "jaw_x",
    JawY => "jaw_y",
    JawZ => "jaw_z",
    /// Tongue position in free space
    TongueFreeX => "tongue_free_x",
    TongueFreeY => "tongue_free_y",
    TongueFreeZ => "tongue_free_z",
    /// Tongue position on the palate
    TonguePalateX => "tongue_palate_x",
    TonguePalateY => "tongue_palate_y",
    TonguePalatePressure => "tongue_palate_pressure",

    // Head
    HeadPresence => "head_presence",
    HeadPosYaw => "head_pos_yaw",
    HeadPosPitch => "head_pos_pitch",
    HeadPosRoll => "head_pos_roll",
    HeadAccYaw => "head_acc_yaw",
    HeadAccPitch => "head_acc_pitch",
    HeadAccRoll => "head_acc_roll",
    HeadVelYaw => "head_vel_yaw",
    HeadVelPitch => "head_vel_pitch",
    HeadVelRoll => "head_vel_roll",
    NeckTension => "neck_tension",

    // System
    /// General calibration status
    CalibrationStatus => "cal_sys",
}

/// Device health status carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusCode {
    /// `OPR`: sensor is operating normally
    Operative,
    /// `ERR`: sensor-side hardware or firmware error
    Error,
    /// `NCA`: sensor needs calibration before use
    NeedsCalibration,
    /// `ICA`: calibration is in progress
    InCalibration,
    /// Fallback for any unrecognized status token
    #[default]
    NotAStatusCode,
}

impl StatusCode {
    /// Parse a wire status token. Unrecognized tokens yield `NotAStatusCode`.
    pub fn from_wire(token: &str) -> Self {
        match token {
            "OPR" => Self::Operative,
            "ERR" => Self::Error,
            "NCA" => Self::NeedsCalibration,
            "ICA" => Self::InCalibration,
            _ => Self::NotAStatusCode,
        }
    }

    /// The wire token for this status.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Operative => "OPR",
            Self::Error => "ERR",
            Self::NeedsCalibration => "NCA",
            Self::InCalibration => "ICA",
            Self::NotAStatusCode => "NaC",
        }
    }
}
