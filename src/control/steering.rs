// src/control/steering.rs
//
// Per-frame steering from the cones in the center region.
//
// Decision table, evaluated in priority order:
//
//   blue cone,   angle inside (min, max)  → one corrective step
//   blue cone,   angle on/outside a bound → reset to 0.0
//   yellow cone, angle inside (min, max)  → one corrective step
//   yellow cone, angle on/outside a bound → reset to 0.0
//   no cone                               → reset to 0.0
//
// Yellow is only looked at when no blue cone was found. The step is
// subtracted from the running angle; which step depends on the cone color
// and the calibrated travel direction:
//
//                     Clockwise    CounterClockwise
//   blue              turn_right   turn_left
//   yellow            turn_left    turn_right

use crate::config::SteeringConfig;
use crate::types::{ConeColor, Contour, Direction};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SteeringDecision {
    BlueInBounds,
    BlueOutOfBounds,
    YellowInBounds,
    YellowOutOfBounds,
    NoCones,
}

impl SteeringDecision {
    fn for_color(color: ConeColor, in_bounds: bool) -> Self {
        match (color, in_bounds) {
            (ConeColor::Blue, true) => SteeringDecision::BlueInBounds,
            (ConeColor::Blue, false) => SteeringDecision::BlueOutOfBounds,
            (ConeColor::Yellow, true) => SteeringDecision::YellowInBounds,
            (ConeColor::Yellow, false) => SteeringDecision::YellowOutOfBounds,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SteeringDecision::BlueInBounds => "BLUE_IN_BOUNDS",
            SteeringDecision::BlueOutOfBounds => "BLUE_OUT_OF_BOUNDS",
            SteeringDecision::YellowInBounds => "YELLOW_IN_BOUNDS",
            SteeringDecision::YellowOutOfBounds => "YELLOW_OUT_OF_BOUNDS",
            SteeringDecision::NoCones => "NO_CONES",
        }
    }
}

pub struct SteeringController {
    config: SteeringConfig,
    area_threshold: f64,
    angle: f32,
}

impl SteeringController {
    pub fn new(config: SteeringConfig, area_threshold: f64) -> Self {
        Self {
            config,
            area_threshold,
            angle: 0.0,
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Run one steering frame. `yellow` is only called when the blue pass
    /// found no cone, so the yellow segmentation can be skipped entirely.
    pub fn update<E, F>(
        &mut self,
        direction: Direction,
        blue: &[Contour],
        yellow: F,
    ) -> Result<SteeringDecision, E>
    where
        F: FnOnce() -> Result<Vec<Contour>, E>,
    {
        if let Some(decision) = self.react(ConeColor::Blue, direction, blue) {
            return Ok(decision);
        }

        let yellow = yellow()?;
        if let Some(decision) = self.react(ConeColor::Yellow, direction, &yellow) {
            return Ok(decision);
        }

        self.angle = 0.0;
        Ok(SteeringDecision::NoCones)
    }

    /// One color pass. Returns `None` when no contour of this color is a cone.
    fn react(
        &mut self,
        color: ConeColor,
        direction: Direction,
        contours: &[Contour],
    ) -> Option<SteeringDecision> {
        let mut handled = false;
        let mut decision = None;

        for contour in contours {
            if !contour.is_significant(self.area_threshold) {
                continue;
            }

            if self.in_bounds() {
                if !handled {
                    handled = true;
                    self.angle -= self.correction(color, direction);
                    decision = Some(SteeringDecision::for_color(color, true));
                }
            } else {
                handled = true;
                self.angle = 0.0;
                decision = Some(SteeringDecision::for_color(color, false));
            }
        }

        decision
    }

    fn in_bounds(&self) -> bool {
        self.angle > self.config.min_angle && self.angle < self.config.max_angle
    }

    fn correction(&self, color: ConeColor, direction: Direction) -> f32 {
        match (color, direction) {
            (ConeColor::Blue, Direction::Clockwise)
            | (ConeColor::Yellow, Direction::CounterClockwise) => self.config.turn_right,
            (ConeColor::Blue, Direction::CounterClockwise)
            | (ConeColor::Yellow, Direction::Clockwise) => self.config.turn_left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn controller() -> SteeringController {
        SteeringController::new(SteeringConfig::default(), 60.0)
    }

    fn cones(areas: &[f64]) -> Vec<Contour> {
        areas.iter().map(|&a| Contour::with_area(a)).collect()
    }

    fn yellow_of(areas: &'static [f64]) -> impl FnOnce() -> Result<Vec<Contour>, Infallible> {
        move || Ok(cones(areas))
    }

    #[test]
    fn test_blue_counter_clockwise_steers_left_away() {
        let mut c = controller();
        let d = c
            .update(Direction::CounterClockwise, &cones(&[120.0]), yellow_of(&[]))
            .unwrap();
        assert_eq!(d, SteeringDecision::BlueInBounds);
        assert_eq!(c.angle(), 0.025);
    }

    #[test]
    fn test_blue_clockwise_steers_right() {
        let mut c = controller();
        c.update(Direction::Clockwise, &cones(&[120.0]), yellow_of(&[]))
            .unwrap();
        assert_eq!(c.angle(), -0.025);
    }

    #[test]
    fn test_yellow_corrections_are_swapped() {
        let mut c = controller();
        let d = c
            .update(Direction::Clockwise, &[], yellow_of(&[120.0]))
            .unwrap();
        assert_eq!(d, SteeringDecision::YellowInBounds);
        assert_eq!(c.angle(), 0.025);

        let mut c = controller();
        c.update(Direction::CounterClockwise, &[], yellow_of(&[120.0]))
            .unwrap();
        assert_eq!(c.angle(), -0.025);
    }

    #[test]
    fn test_blue_takes_priority_and_skips_yellow() {
        let mut c = controller();
        let mut yellow_called = false;
        let d = c
            .update(Direction::Clockwise, &cones(&[120.0]), || {
                yellow_called = true;
                Ok::<_, Infallible>(cones(&[500.0]))
            })
            .unwrap();
        assert_eq!(d, SteeringDecision::BlueInBounds);
        assert!(!yellow_called);
        assert_eq!(c.angle(), -0.025);
    }

    #[test]
    fn test_insignificant_blue_falls_through_to_yellow() {
        let mut c = controller();
        let d = c
            .update(Direction::Clockwise, &cones(&[10.0, 60.0]), yellow_of(&[61.0]))
            .unwrap();
        assert_eq!(d, SteeringDecision::YellowInBounds);
    }

    #[test]
    fn test_no_cones_resets_running_angle() {
        let mut c = controller();
        c.angle = 0.1;
        let d = c
            .update(Direction::Clockwise, &[], yellow_of(&[]))
            .unwrap();
        assert_eq!(d, SteeringDecision::NoCones);
        assert_eq!(c.angle(), 0.0);
    }

    #[test]
    fn test_angle_persists_across_frames() {
        let mut c = controller();
        for _ in 0..3 {
            c.update(Direction::CounterClockwise, &cones(&[120.0]), yellow_of(&[]))
                .unwrap();
        }
        assert!((c.angle() - 0.075).abs() < 1e-6);
    }

    #[test]
    fn test_minimum_bound_resets_instead_of_clamping() {
        let mut c = controller();
        c.angle = -0.3;
        let d = c
            .update(Direction::Clockwise, &cones(&[120.0]), yellow_of(&[]))
            .unwrap();
        assert_eq!(d, SteeringDecision::BlueOutOfBounds);
        assert_eq!(c.angle(), 0.0);
    }

    #[test]
    fn test_maximum_bound_resets_for_yellow() {
        let mut c = controller();
        c.angle = 0.3;
        let d = c
            .update(Direction::Clockwise, &[], yellow_of(&[120.0]))
            .unwrap();
        assert_eq!(d, SteeringDecision::YellowOutOfBounds);
        assert_eq!(c.angle(), 0.0);
    }

    #[test]
    fn test_multiple_cones_step_once() {
        let mut c = controller();
        c.update(
            Direction::Clockwise,
            &cones(&[120.0, 300.0, 75.0]),
            yellow_of(&[]),
        )
        .unwrap();
        assert_eq!(c.angle(), -0.025);
    }

    #[test]
    fn test_step_past_bound_is_reset_by_next_cone() {
        let mut c = controller();
        c.angle = 0.29;
        c.update(Direction::CounterClockwise, &cones(&[120.0]), yellow_of(&[]))
            .unwrap();
        assert!(c.angle() > 0.3);

        let mut c = controller();
        c.angle = 0.29;
        let d = c
            .update(
                Direction::CounterClockwise,
                &cones(&[120.0, 120.0]),
                yellow_of(&[]),
            )
            .unwrap();
        assert_eq!(d, SteeringDecision::BlueOutOfBounds);
        assert_eq!(c.angle(), 0.0);
    }

    #[test]
    fn test_out_of_bounds_angle_recovers_next_frame() {
        let mut c = controller();
        c.angle = 0.31;
        let d = c
            .update(Direction::CounterClockwise, &cones(&[120.0]), yellow_of(&[]))
            .unwrap();
        assert_eq!(d, SteeringDecision::BlueOutOfBounds);
        c.update(Direction::CounterClockwise, &cones(&[120.0]), yellow_of(&[]))
            .unwrap();
        assert_eq!(c.angle(), 0.025);
    }

    #[test]
    fn test_yellow_error_is_propagated() {
        let mut c = controller();
        let result = c.update(Direction::Clockwise, &[], || Err::<Vec<Contour>, _>("boom"));
        assert_eq!(result, Err("boom"));
    }
}
