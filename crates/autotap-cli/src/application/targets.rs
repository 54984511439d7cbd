//! Target selection strategies.
//!
//! A [`TargetSelector`] decides *what* the next action is; the scheduler
//! decides *when*.  The default strategy taps a random point inside the
//! configured area, drawn through the same truncated-normal sampler the
//! delays use so taps cluster around the area's centre.
//!
//! Strategies that inspect the screen (e.g. locate a button in a captured
//! frame) implement the same trait and drop in without any scheduler
//! changes.

use autotap_core::{ActionConfig, BridgeCommand, NormalSampler};

use super::scheduler::TargetSelector;

/// Taps random points inside a rectangular area.
pub struct RandomAreaSelector {
    x_min: u32,
    x_max: u32,
    y_min: u32,
    y_max: u32,
    sampler: NormalSampler,
}

impl RandomAreaSelector {
    pub fn new(config: &ActionConfig, sampler: NormalSampler) -> Self {
        Self {
            x_min: config.x_min,
            x_max: config.x_max,
            y_min: config.y_min,
            y_max: config.y_max,
            sampler,
        }
    }
}

impl TargetSelector for RandomAreaSelector {
    fn next_action(&mut self) -> BridgeCommand {
        let x = self.sampler.sample_coord(self.x_min, self.x_max);
        let y = self.sampler.sample_coord(self.y_min, self.y_max);
        BridgeCommand::Tap { x, y }
    }
}

/// Repeats one fixed key event, for flows driven by a hardware key
/// (e.g. volume or d-pad) instead of screen taps.
pub struct FixedKeySelector {
    code: u32,
}

impl FixedKeySelector {
    pub fn new(code: u32) -> Self {
        Self { code }
    }
}

impl TargetSelector for FixedKeySelector {
    fn next_action(&mut self) -> BridgeCommand {
        BridgeCommand::KeyEvent { code: self.code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_config(x_min: u32, x_max: u32, y_min: u32, y_max: u32) -> ActionConfig {
        ActionConfig {
            click_delay_min: 0,
            click_delay_max: 0,
            x_min,
            x_max,
            y_min,
            y_max,
            rest_interval_min: 0,
            rest_interval_max: 0,
            rest_duration_min: 0,
            rest_duration_max: 0,
        }
    }

    #[test]
    fn test_taps_stay_inside_the_area() {
        let mut selector =
            RandomAreaSelector::new(&area_config(100, 980, 400, 1800), NormalSampler::seeded(11));
        for _ in 0..5_000 {
            match selector.next_action() {
                BridgeCommand::Tap { x, y } => {
                    assert!((100..=980).contains(&x));
                    assert!((400..=1800).contains(&y));
                }
                other => panic!("unexpected action: {other}"),
            }
        }
    }

    #[test]
    fn test_degenerate_area_taps_the_single_point() {
        let mut selector =
            RandomAreaSelector::new(&area_config(540, 540, 1200, 1200), NormalSampler::seeded(11));
        assert_eq!(selector.next_action(), BridgeCommand::Tap { x: 540, y: 1200 });
    }

    #[test]
    fn test_fixed_key_selector_repeats_the_keycode() {
        let mut selector = FixedKeySelector::new(24);
        assert_eq!(selector.next_action(), BridgeCommand::KeyEvent { code: 24 });
        assert_eq!(selector.next_action(), BridgeCommand::KeyEvent { code: 24 });
    }
}
