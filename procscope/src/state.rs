//! Per-frame loop state and its transition function.
//!
//! The interactive loop threads a small state value through its frames.
//! [`LoopState::step`] is a pure function over the edge-triggered key set, so
//! navigation and module-display behavior can be tested without a terminal or
//! any platform session.

/// Logical buttons newly pressed during one frame.
///
/// The set is edge-triggered: a held key appears only on the frame it went
/// down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pressed {
    /// Terminate the loop.
    pub exit: bool,
    /// Advance the selection one slot, wrapping at the top.
    pub up: bool,
    /// Move the selection back one slot, wrapping at the bottom.
    pub down: bool,
    /// Request module detail for the selected process.
    pub action: bool,
}

/// How the module-detail button behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleDisplayMode {
    /// Once requested, module detail stays on for every later refresh.
    ///
    /// This is the observed behavior of the original tool.
    #[default]
    Latch,
    /// Each press flips module detail on or off.
    Toggle,
}

/// Fixed parameters of one interactive session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of selectable process slots. The selection wraps modulo this
    /// capacity, not the number of live processes.
    pub process_capacity: u32,
    /// Maximum number of module records stored per report.
    pub module_capacity: u32,
    /// Behavior of the module-detail button.
    pub module_display: ModuleDisplayMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_capacity: 64,
            module_capacity: 16,
            module_display: ModuleDisplayMode::default(),
        }
    }
}

/// State threaded between frames of the interactive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    /// Currently highlighted process slot.
    pub selection: u32,
    /// Whether refreshes include the module dump.
    pub show_modules: bool,
    /// Whether the next frame must redraw the report.
    pub dirty: bool,
}

/// Outcome of feeding one frame of input into the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep looping with the updated state.
    Continue(LoopState),
    /// The exit button was pressed.
    Exit,
}

impl LoopState {
    /// Initial state: dirty, so the very first frame prints a report.
    #[must_use]
    pub fn new() -> Self {
        Self {
            selection: 0,
            show_modules: false,
            dirty: true,
        }
    }

    /// Apply one frame of input.
    ///
    /// Exit takes precedence over everything else. Navigation is cyclic over
    /// the full process capacity (a zero capacity is treated as one slot).
    #[must_use]
    pub fn step(self, pressed: Pressed, config: &Config) -> Transition {
        if pressed.exit {
            return Transition::Exit;
        }

        let capacity = config.process_capacity.max(1);
        let mut next = self;

        if pressed.up {
            next.selection = if next.selection >= capacity - 1 {
                0
            } else {
                next.selection + 1
            };
            next.dirty = true;
        }

        if pressed.down {
            next.selection = if next.selection == 0 {
                capacity - 1
            } else {
                next.selection - 1
            };
            next.dirty = true;
        }

        if pressed.action {
            next.show_modules = match config.module_display {
                ModuleDisplayMode::Latch => true,
                ModuleDisplayMode::Toggle => !next.show_modules,
            };
            next.dirty = true;
        }

        Transition::Continue(next)
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(state: LoopState, pressed: Pressed, config: &Config) -> LoopState {
        match state.step(pressed, config) {
            Transition::Continue(state) => state,
            Transition::Exit => panic!("unexpected exit"),
        }
    }

    const UP: Pressed = Pressed {
        exit: false,
        up: true,
        down: false,
        action: false,
    };
    const DOWN: Pressed = Pressed {
        exit: false,
        up: false,
        down: true,
        action: false,
    };
    const ACTION: Pressed = Pressed {
        exit: false,
        up: false,
        down: false,
        action: true,
    };

    #[test]
    fn test_up_wraps_over_full_capacity() {
        let config = Config::default();
        let mut state = LoopState::new();

        for expected in 1..64_u32 {
            state = next(state, UP, &config);
            assert_eq!(state.selection, expected);
            assert!(state.dirty);
        }
        state = next(state, UP, &config);
        assert_eq!(state.selection, 0);
    }

    #[test]
    fn test_down_from_zero_wraps_to_last_slot() {
        // The wraparound is modulo the capacity even when far fewer processes
        // are live: down from slot 0 selects slot 63, not the last live one.
        let config = Config::default();
        let state = next(LoopState::new(), DOWN, &config);
        assert_eq!(state.selection, 63);

        let state = next(state, DOWN, &config);
        assert_eq!(state.selection, 62);
    }

    #[test]
    fn test_custom_capacity() {
        let config = Config {
            process_capacity: 3,
            ..Config::default()
        };
        let mut state = next(LoopState::new(), UP, &config);
        state = next(state, UP, &config);
        assert_eq!(state.selection, 2);
        state = next(state, UP, &config);
        assert_eq!(state.selection, 0);
    }

    #[test]
    fn test_zero_capacity_is_one_slot() {
        let config = Config {
            process_capacity: 0,
            ..Config::default()
        };
        let state = next(LoopState::new(), UP, &config);
        assert_eq!(state.selection, 0);
        let state = next(state, DOWN, &config);
        assert_eq!(state.selection, 0);
    }

    #[test]
    fn test_exit_takes_precedence() {
        let config = Config::default();
        let pressed = Pressed {
            exit: true,
            up: true,
            down: true,
            action: true,
        };
        assert_eq!(LoopState::new().step(pressed, &config), Transition::Exit);

        // Exit works from any state, dirty or not.
        let state = LoopState {
            selection: 17,
            show_modules: true,
            dirty: false,
        };
        let pressed = Pressed {
            exit: true,
            ..Pressed::default()
        };
        assert_eq!(state.step(pressed, &config), Transition::Exit);
    }

    #[test]
    fn test_action_latches() {
        let config = Config::default();
        let state = next(LoopState::new(), ACTION, &config);
        assert!(state.show_modules);
        assert!(state.dirty);

        // A second press does not clear the latch.
        let state = next(state, ACTION, &config);
        assert!(state.show_modules);

        // Neither does navigating.
        let state = next(state, UP, &config);
        assert!(state.show_modules);
    }

    #[test]
    fn test_action_toggles_when_configured() {
        let config = Config {
            module_display: ModuleDisplayMode::Toggle,
            ..Config::default()
        };
        let state = next(LoopState::new(), ACTION, &config);
        assert!(state.show_modules);
        let state = next(state, ACTION, &config);
        assert!(!state.show_modules);
        assert!(state.dirty);
    }

    #[test]
    fn test_no_input_leaves_state_untouched() {
        let config = Config::default();
        let state = LoopState {
            selection: 5,
            show_modules: true,
            dirty: false,
        };
        assert_eq!(
            state.step(Pressed::default(), &config),
            Transition::Continue(state)
        );
    }
}
