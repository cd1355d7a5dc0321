use std::sync::Arc;
use std::sync::mpsc::Receiver;

use anyhow::Result;
use tracing::{debug, info};

use crate::prefs::Preferences;

use super::nav::{Destination, NavigationEvent, Navigator};
use super::{EventStream, Observable, Screen, ScreenCore, UiState};

pub const PIN_LENGTH: usize = 4;
const PIN_CODE_KEY: &str = "pin_code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCodeMode {
    SetNewPinCode,
    EnterPinCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadInput {
    Symbol(char),
    Clear(bool),
    Accept(bool),
}

impl PadInput {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Symbol(_) => true,
            Self::Clear(enabled) | Self::Accept(enabled) => *enabled,
        }
    }
}

pub type KeypadLayout = [[PadInput; 3]; 4];

pub const DEFAULT_LAYOUT: KeypadLayout = [
    [PadInput::Symbol('1'), PadInput::Symbol('2'), PadInput::Symbol('3')],
    [PadInput::Symbol('4'), PadInput::Symbol('5'), PadInput::Symbol('6')],
    [PadInput::Symbol('7'), PadInput::Symbol('8'), PadInput::Symbol('9')],
    [PadInput::Clear(false), PadInput::Symbol('0'), PadInput::Accept(false)],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCodeEvent {
    Idle,
    InvalidPinCode,
}

/// Access gate in front of the app. The secret lives in preferences.
#[derive(Clone)]
pub struct PinScreen {
    core: ScreenCore,
    prefs: Arc<dyn Preferences>,
    mode: Observable<PinCodeMode>,
    pin_code: Observable<String>,
    layout: Observable<KeypadLayout>,
    events: EventStream<PinCodeEvent>,
}

impl PinScreen {
    pub fn new(navigator: Navigator, prefs: Arc<dyn Preferences>) -> Self {
        Self {
            core: ScreenCore::new("pin", navigator),
            prefs,
            mode: Observable::new(PinCodeMode::EnterPinCode),
            pin_code: Observable::new(String::new()),
            layout: Observable::new(DEFAULT_LAYOUT),
            events: EventStream::default(),
        }
    }

    pub fn mode(&self) -> &Observable<PinCodeMode> {
        &self.mode
    }

    pub fn pin_code(&self) -> &Observable<String> {
        &self.pin_code
    }

    pub fn layout(&self) -> &Observable<KeypadLayout> {
        &self.layout
    }

    pub fn events(&self) -> Receiver<PinCodeEvent> {
        self.events.subscribe()
    }

    pub fn on_button_pressed(&self, input: PadInput) {
        match input {
            PadInput::Symbol(symbol) => self.on_symbol(symbol),
            PadInput::Clear(_) => self.on_clear(),
            PadInput::Accept(_) => {
                if let Err(err) = self.on_accept() {
                    self.core.set_state(UiState::Error(format!("{err:#}")));
                }
            }
        }
    }

    pub fn on_change_pin_code_pressed(&self) {
        if let Err(err) = self.prefs.remove(PIN_CODE_KEY) {
            self.core.set_state(UiState::Error(format!("{err:#}")));
            return;
        }
        info!("pin code erased");
        self.set_pin_code(String::new());
        self.core.publish(&self.mode, PinCodeMode::SetNewPinCode);
    }

    fn on_symbol(&self, symbol: char) {
        let mut pin_code = self.pin_code.get();
        if pin_code.chars().count() < PIN_LENGTH {
            pin_code.push(symbol);
            self.set_pin_code(pin_code);
        }
        self.core.emit(&self.events, PinCodeEvent::Idle);
    }

    fn on_clear(&self) {
        if self.pin_code.get().is_empty() {
            return;
        }
        // Both flags drop back to their defaults here.
        self.set_pin_code(String::new());
        self.core.emit(&self.events, PinCodeEvent::Idle);
    }

    fn on_accept(&self) -> Result<()> {
        let pin_code = self.pin_code.get();
        if pin_code.chars().count() != PIN_LENGTH {
            return Ok(());
        }

        match self.mode.get() {
            PinCodeMode::EnterPinCode => {
                if self.prefs.get_string(PIN_CODE_KEY).as_deref() == Some(pin_code.as_str()) {
                    self.core.set_state(UiState::Success("Unlocked!".to_string()));
                    let core = self.core.clone();
                    self.core.launch("unlock", move || {
                        if core.scope().sleep(core.timings().unlock_grace) {
                            core.navigate(NavigationEvent::To(Destination::Home));
                        }
                        Ok(())
                    });
                } else {
                    debug!("pin code mismatch");
                    self.core.emit(&self.events, PinCodeEvent::InvalidPinCode);
                }
            }
            PinCodeMode::SetNewPinCode => {
                self.prefs.put_string(PIN_CODE_KEY, &pin_code)?;
                info!("new pin code stored");
                self.set_pin_code(String::new());
                self.core.publish(&self.mode, PinCodeMode::EnterPinCode);
            }
        }
        Ok(())
    }

    fn set_pin_code(&self, pin_code: String) {
        self.sync_keypad(&pin_code);
        self.core.publish(&self.pin_code, pin_code);
    }

    fn sync_keypad(&self, pin_code: &str) {
        let clear = !pin_code.is_empty();
        let accept = pin_code.chars().count() == PIN_LENGTH;
        let mut layout = self.layout.get();
        if layout[3][0] == PadInput::Clear(clear) && layout[3][2] == PadInput::Accept(accept) {
            return;
        }
        layout[3][0] = PadInput::Clear(clear);
        layout[3][2] = PadInput::Accept(accept);
        self.core.publish(&self.layout, layout);
    }

    fn load_mode(&self) {
        let mode = match self.prefs.get_string(PIN_CODE_KEY) {
            Some(_) => PinCodeMode::EnterPinCode,
            None => PinCodeMode::SetNewPinCode,
        };
        self.core.publish(&self.mode, mode);
    }
}

impl Screen for PinScreen {
    type Seed = ();

    fn core(&self) -> &ScreenCore {
        &self.core
    }

    fn initialize(&self, _seed: Option<()>) {
        if !self.core.begin_initialize() {
            return;
        }
        self.core.set_state(UiState::Loading);
        self.load_mode();
        self.core.set_state(UiState::Idle);
    }

    fn refresh(&self) {
        self.core.set_state(UiState::Refreshing);
        self.load_mode();
        self.core.set_state(UiState::Idle);
    }

    fn on_back_pressed(&self) {
        self.core.navigate(NavigationEvent::Quit);
    }
}
