//! System state machine module
//!
//! Drives bring-up and recovery of the remote: board configuration, WiFi
//! association, camera pairing and then the idle loop that serves buttons.

use alloc::vec::Vec;
use log::{info, warn};

use crate::led_control::LedStatus;

/// System states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    // Initialization
    SystemInit,
    BoardConfiguring,

    // Network
    WiFiConnecting,
    CameraConfiguring,

    // Running
    Idle,

    // Recovery
    Reconnecting,
    CameraError,
}

/// System events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    SystemStarted,
    BoardConfigured,

    WiFiConnected,
    WiFiDisconnected,

    CameraConfigured,
    CameraConfigFailed,

    RecoveryRequested,
}

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// Keep the current state
    Stay,
    /// Move to a new state
    Transition(SystemState),
    /// Move to a new state and clear the recovery count
    TransitionWithReset(SystemState),
}

/// Work the orchestrator has to perform for the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Blink the status LED n times
    Blink(u8),
    /// Set up buttons and the status LED
    ConfigureBoard,
    /// Associate with the camera access point (blocks until done)
    ConnectWiFi,
    /// Pair with the camera and push the current mode
    ConfigureCamera,
    /// Check the WiFi link
    MonitorConnection,
    /// Serve pending button presses
    ProcessButtons,
    /// Restart bring-up after a failure
    SystemRecover,
    /// Log the error state
    LogError(SystemState),
}

/// Bring-up and recovery state machine
pub struct SystemStateMachine {
    current_state: SystemState,
    previous_state: Option<SystemState>,
    entry_pending: bool,
    recovery_count: u32,
}

impl SystemStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: SystemState::SystemInit,
            previous_state: None,
            entry_pending: false,
            recovery_count: 0,
        }
    }

    pub fn current_state(&self) -> SystemState {
        self.current_state
    }

    pub fn previous_state(&self) -> Option<SystemState> {
        self.previous_state
    }

    /// Recoveries since the camera was last configured successfully
    pub fn recovery_count(&self) -> u32 {
        self.recovery_count
    }

    pub fn is_operational(&self) -> bool {
        self.current_state == SystemState::Idle
    }

    pub fn is_error_state(&self) -> bool {
        self.current_state == SystemState::CameraError
    }

    /// Process a system event
    pub fn handle_event(&mut self, event: SystemEvent) -> StateTransition {
        let transition = self.state_transition(self.current_state, event);

        match transition {
            StateTransition::Transition(new_state) => {
                if event == SystemEvent::RecoveryRequested {
                    self.recovery_count = self.recovery_count.saturating_add(1);
                }
                self.transition_to_state(new_state);
            }
            StateTransition::TransitionWithReset(new_state) => {
                self.recovery_count = 0;
                self.transition_to_state(new_state);
            }
            StateTransition::Stay => {}
        }

        transition
    }

    /// Actions for the current state.
    ///
    /// Entry feedback (blinks) is emitted once per state entry, the
    /// remaining actions every time.
    pub fn update(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.entry_pending {
            self.entry_pending = false;
            match (self.previous_state, self.current_state) {
                (Some(SystemState::BoardConfiguring), SystemState::WiFiConnecting) => {
                    actions.push(Action::Blink(LedStatus::BoardConfigured.blink_count()));
                }
                (_, SystemState::CameraConfiguring) => {
                    actions.push(Action::Blink(LedStatus::WiFiConnected.blink_count()));
                }
                _ => {}
            }
        }

        match self.current_state {
            SystemState::SystemInit => {}
            SystemState::BoardConfiguring => actions.push(Action::ConfigureBoard),
            SystemState::WiFiConnecting => actions.push(Action::ConnectWiFi),
            SystemState::CameraConfiguring => actions.push(Action::ConfigureCamera),
            SystemState::Idle => {
                actions.push(Action::MonitorConnection);
                actions.push(Action::ProcessButtons);
            }
            SystemState::Reconnecting => {
                actions.push(Action::LogError(self.current_state));
                actions.push(Action::ConnectWiFi);
            }
            SystemState::CameraError => {
                actions.push(Action::LogError(self.current_state));
                actions.push(Action::SystemRecover);
            }
        }

        actions
    }

    fn transition_to_state(&mut self, new_state: SystemState) {
        if new_state == self.current_state {
            return;
        }
        match new_state {
            SystemState::Idle => info!("[STATE] System operational"),
            SystemState::CameraError | SystemState::Reconnecting => {
                warn!(
                    "[STATE] Error state: {:?} (recoveries: {})",
                    new_state, self.recovery_count
                );
            }
            _ => info!("[STATE] {:?} -> {:?}", self.current_state, new_state),
        }

        self.previous_state = Some(self.current_state);
        self.current_state = new_state;
        self.entry_pending = true;
    }

    fn state_transition(&self, current_state: SystemState, event: SystemEvent) -> StateTransition {
        match (current_state, event) {
            // Startup
            (SystemState::SystemInit, SystemEvent::SystemStarted) => {
                StateTransition::Transition(SystemState::BoardConfiguring)
            }
            (SystemState::BoardConfiguring, SystemEvent::BoardConfigured) => {
                StateTransition::Transition(SystemState::WiFiConnecting)
            }

            // Association, then camera pairing
            (SystemState::WiFiConnecting, SystemEvent::WiFiConnected)
            | (SystemState::Reconnecting, SystemEvent::WiFiConnected) => {
                StateTransition::Transition(SystemState::CameraConfiguring)
            }
            (SystemState::CameraConfiguring, SystemEvent::CameraConfigured) => {
                StateTransition::TransitionWithReset(SystemState::Idle)
            }
            (SystemState::CameraConfiguring, SystemEvent::CameraConfigFailed) => {
                StateTransition::Transition(SystemState::CameraError)
            }

            // Link loss once associated; the camera forgets the pairing
            (SystemState::CameraConfiguring, SystemEvent::WiFiDisconnected)
            | (SystemState::Idle, SystemEvent::WiFiDisconnected) => {
                StateTransition::Transition(SystemState::Reconnecting)
            }

            // Failed camera configuration restarts bring-up from association
            (SystemState::CameraError, SystemEvent::RecoveryRequested) => {
                StateTransition::Transition(SystemState::WiFiConnecting)
            }

            _ => StateTransition::Stay,
        }
    }
}

impl Default for SystemStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brought_up() -> SystemStateMachine {
        let mut sm = SystemStateMachine::new();
        for event in [
            SystemEvent::SystemStarted,
            SystemEvent::BoardConfigured,
            SystemEvent::WiFiConnected,
            SystemEvent::CameraConfigured,
        ] {
            sm.handle_event(event);
        }
        sm
    }

    #[test]
    fn bring_up_sequence() {
        let mut sm = SystemStateMachine::new();
        assert!(sm.update().is_empty());

        sm.handle_event(SystemEvent::SystemStarted);
        assert_eq!(sm.update(), [Action::ConfigureBoard]);

        sm.handle_event(SystemEvent::BoardConfigured);
        assert_eq!(sm.update(), [Action::Blink(2), Action::ConnectWiFi]);
        // Entry blink only once
        assert_eq!(sm.update(), [Action::ConnectWiFi]);

        sm.handle_event(SystemEvent::WiFiConnected);
        assert_eq!(sm.update(), [Action::Blink(3), Action::ConfigureCamera]);

        assert_eq!(
            sm.handle_event(SystemEvent::CameraConfigured),
            StateTransition::TransitionWithReset(SystemState::Idle)
        );
        assert!(sm.is_operational());
        assert_eq!(
            sm.update(),
            [Action::MonitorConnection, Action::ProcessButtons]
        );
    }

    #[test]
    fn camera_failure_restarts_from_association() {
        let mut sm = SystemStateMachine::new();
        sm.handle_event(SystemEvent::SystemStarted);
        sm.handle_event(SystemEvent::BoardConfigured);
        sm.handle_event(SystemEvent::WiFiConnected);
        sm.handle_event(SystemEvent::CameraConfigFailed);

        assert!(sm.is_error_state());
        assert_eq!(
            sm.update(),
            [
                Action::LogError(SystemState::CameraError),
                Action::SystemRecover
            ]
        );

        sm.handle_event(SystemEvent::RecoveryRequested);
        assert_eq!(sm.current_state(), SystemState::WiFiConnecting);
        assert_eq!(sm.recovery_count(), 1);
        // No board blink on recovery
        assert_eq!(sm.update(), [Action::ConnectWiFi]);

        sm.handle_event(SystemEvent::WiFiConnected);
        sm.handle_event(SystemEvent::CameraConfigured);
        assert_eq!(sm.recovery_count(), 0);
    }

    #[test]
    fn link_loss_while_idle_reconnects_and_reconfigures() {
        let mut sm = brought_up();
        sm.update();

        sm.handle_event(SystemEvent::WiFiDisconnected);
        assert_eq!(sm.current_state(), SystemState::Reconnecting);
        assert_eq!(
            sm.update(),
            [
                Action::LogError(SystemState::Reconnecting),
                Action::ConnectWiFi
            ]
        );

        sm.handle_event(SystemEvent::WiFiConnected);
        assert_eq!(sm.current_state(), SystemState::CameraConfiguring);
        assert_eq!(sm.update(), [Action::Blink(3), Action::ConfigureCamera]);
    }

    #[test]
    fn unexpected_events_are_ignored() {
        let mut sm = SystemStateMachine::new();
        assert_eq!(
            sm.handle_event(SystemEvent::WiFiDisconnected),
            StateTransition::Stay
        );
        assert_eq!(
            sm.handle_event(SystemEvent::CameraConfigured),
            StateTransition::Stay
        );
        assert_eq!(sm.current_state(), SystemState::SystemInit);
        assert_eq!(sm.previous_state(), None);

        let mut sm = brought_up();
        assert_eq!(
            sm.handle_event(SystemEvent::RecoveryRequested),
            StateTransition::Stay
        );
        assert_eq!(sm.previous_state(), Some(SystemState::CameraConfiguring));
    }
}
