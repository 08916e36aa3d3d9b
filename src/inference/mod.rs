//! Inference module
//!
//! Turns a trained [`Model`](crate::training::Model) and a feature table into
//! predictions, optional class probabilities, per-sample confidence and
//! per-feature importance.

mod engine;

pub use engine::{
    dispatch, feature_importance, ClassProbabilities, InferenceEngine, PredictionResult, RawPrediction,
    FIXED_CONFIDENCE,
};
