/// Per-stage progress weights, always expressed as percentages of the whole
/// job (spec.md §4.5). `bgm_detect` carries no weight of its own — it is a
/// near-instant CPU pass folded into the fixed overhead already accounted
/// for by `extract`/`split`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageWeights {
    pub extract: f64,
    pub split: f64,
    pub bgm_detect: f64,
    pub separate: f64,
    pub transcribe: f64,
    pub align: f64,
    pub render: f64,
    pub complete: f64,
}

/// Inputs driving the dynamic part of the weight computation.
#[derive(Debug, Clone, Copy)]
pub struct WeightInputs {
    pub total_segments: u32,
    pub segments_requiring_separation: u32,
    pub expected_retry_fraction: f64,
    pub alignment_used: bool,
}

const EXTRACT: f64 = 5.0;
const SPLIT: f64 = 5.0;
const RENDER: f64 = 10.0;
const COMPLETE: f64 = 5.0;
const TRANSCRIBE_FLOOR: f64 = 40.0;

impl StageWeights {
    /// Computes stage weights per spec.md §4.5. The fixed stages (extract,
    /// split, render, complete) are constants; separation and retry weight
    /// scale with how much of the job actually needs them, capped at 15 and
    /// 20 respectively; alignment is an all-or-nothing 10; transcribe
    /// absorbs whatever remains, floored at 40 so the progress bar never
    /// stalls even when every variable weight is maxed out.
    pub fn compute(inputs: &WeightInputs) -> Self {
        let separation_fraction = if inputs.total_segments == 0 {
            0.0
        } else {
            inputs.segments_requiring_separation as f64 / inputs.total_segments as f64
        };
        let separate = (15.0 * separation_fraction).min(15.0);
        let retry = (20.0 * inputs.expected_retry_fraction.max(0.0)).min(20.0);
        let align = if inputs.alignment_used { 10.0 } else { 0.0 };

        let fixed = EXTRACT + SPLIT + RENDER + COMPLETE;
        let transcribe = (100.0 - fixed - separate - retry - align).max(TRANSCRIBE_FLOOR);

        StageWeights {
            extract: EXTRACT,
            split: SPLIT,
            bgm_detect: 0.0,
            separate,
            transcribe,
            align,
            render: RENDER,
            complete: COMPLETE,
        }
    }

    pub fn sum(&self) -> f64 {
        self.extract + self.split + self.bgm_detect + self.separate + self.transcribe + self.align + self.render + self.complete
    }
}
