use serde::{Serialize, Deserialize};

/// Top-5 classification result for the uploaded image.
///
/// `top5_indices[i]` pairs with `top5_probs[i]`; probabilities are
/// non-increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub top5_indices: Vec<usize>,
    pub top5_probs: Vec<f64>,
}

impl PredictionSet {
    /// `(class index, probability)` pairs, best first.
    pub fn entries(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.top5_indices.iter().copied().zip(self.top5_probs.iter().copied())
    }

    /// The highest-probability class, if any.
    pub fn best(&self) -> Option<(usize, f64)> {
        self.entries().next()
    }

    /// Checks the pairing and ordering guarantees the backend promises.
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.top5_indices.len() != self.top5_probs.len() {
            return Err(format!(
                "prediction has {} indices but {} probabilities",
                self.top5_indices.len(),
                self.top5_probs.len()
            ));
        }
        if self.top5_probs.windows(2).any(|w| w[1] > w[0]) {
            return Err("prediction probabilities are not sorted best-first".to_owned());
        }
        Ok(())
    }
}
