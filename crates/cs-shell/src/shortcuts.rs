//! Keyboard shortcuts for navigation and blocked developer tools.

use cs_host::KeyChord;
use cs_host::NavAction;

/// Desktop platform whose shortcut conventions apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
        }
    }
}

/// Chord to action table for one platform.
#[derive(Debug, Clone)]
pub struct ShortcutMap {
    platform: Platform,
    bindings: Vec<(KeyChord, NavAction)>,
    system_info: KeyChord,
}

impl ShortcutMap {
    pub fn for_platform(platform: Platform) -> Self {
        let bindings = match platform {
            Platform::MacOs => vec![
                (KeyChord::new("Left").meta(), NavAction::Back),
                (KeyChord::new("Right").meta(), NavAction::Forward),
                (KeyChord::new("R").meta(), NavAction::Refresh),
                (KeyChord::new("H").meta().shift(), NavAction::Home),
            ],
            Platform::Windows => vec![
                (KeyChord::new("Left").alt(), NavAction::Back),
                (KeyChord::new("Right").alt(), NavAction::Forward),
                (KeyChord::new("F5"), NavAction::Refresh),
                (KeyChord::new("H").alt(), NavAction::Home),
            ],
            Platform::Linux => vec![
                (KeyChord::new("Left").alt(), NavAction::Back),
                (KeyChord::new("Right").alt(), NavAction::Forward),
                (KeyChord::new("R").ctrl(), NavAction::Refresh),
                (KeyChord::new("H").alt(), NavAction::Home),
            ],
        };
        let system_info = match platform {
            Platform::MacOs => KeyChord::new("I").meta(),
            Platform::Windows | Platform::Linux => KeyChord::new("I").alt(),
        };
        Self {
            platform,
            bindings,
            system_info,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn action_for(&self, chord: &KeyChord) -> Option<NavAction> {
        self.bindings
            .iter()
            .find(|(binding, _)| binding.matches(chord))
            .map(|(_, action)| *action)
    }

    pub fn bindings(&self) -> &[(KeyChord, NavAction)] {
        &self.bindings
    }

    /// True for the chord that opens the system information dialog.
    pub fn is_system_info(&self, chord: &KeyChord) -> bool {
        self.system_info.matches(chord)
    }
}

/// True for chords that would open developer tools or page source. Extra
/// modifiers do not make a chord safe: Shift+F12 still opens the tools.
pub fn is_devtools_chord(chord: &KeyChord) -> bool {
    let blocked = [
        KeyChord::new("F12"),
        KeyChord::new("I").ctrl().shift(),
        KeyChord::new("J").ctrl().shift(),
        KeyChord::new("C").ctrl().shift(),
        KeyChord::new("I").meta().alt(),
        KeyChord::new("J").meta().alt(),
        KeyChord::new("C").meta().alt(),
        KeyChord::new("U").ctrl(),
        KeyChord::new("U").meta(),
    ];
    blocked.iter().any(|required| required.is_held_in(chord))
}
