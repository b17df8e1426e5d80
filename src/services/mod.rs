// Rep detection, logging and feedback services

pub mod audio_cues;
pub mod exercise_detector;
pub mod joint_angles;
pub mod pose_frame_processor;
pub mod rep_state_machine;
pub mod session_logger;
pub mod synthetic_pose;
pub mod workout_session;

pub use audio_cues::{AudioCue, AudioCueDispatcher, ChannelCueSink, CueSink, TracingCueSink};
pub use exercise_detector::{detector_for, registered_exercises, ExerciseProfile, PrimaryMetric};
pub use pose_frame_processor::{
    FrameOutcome, FrameProcessorConfig, PoseFrameProcessor, PoseSource, ScriptedPoseSource,
};
pub use rep_state_machine::{PhaseEvent, RepCompleted, RepDetectionConfig, RepPhaseStateMachine};
pub use session_logger::{SessionLogger, SessionLoggerConfig, SetOutcome};
pub use workout_session::{
    create_session, SessionHandle, SessionTracker, TrackerSnapshot, WorkoutPipeline,
};
