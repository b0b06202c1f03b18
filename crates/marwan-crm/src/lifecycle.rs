use log::debug;

/// A window-like thing the application can show, report progress on, and
/// close.
pub trait Surface {
    fn show(&mut self);
    fn update_status(&mut self, message: &str, progress: u8);
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    NotStarted,
    Splash,
    Main,
    Closed,
}

/// Owns the splash and main surfaces and moves between them.
pub struct AppLifecycle<S: Surface, M: Surface> {
    splash: S,
    main: M,
    phase: LifecyclePhase,
}

impl<S: Surface, M: Surface> AppLifecycle<S, M> {
    pub fn new(splash: S, main: M) -> Self {
        Self {
            splash,
            main,
            phase: LifecyclePhase::NotStarted,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn start(&mut self) {
        if self.phase == LifecyclePhase::NotStarted {
            self.splash.show();
            self.phase = LifecyclePhase::Splash;
        }
    }

    /// Progress messages only reach the splash while it is up.
    pub fn report(&mut self, message: &str, progress: u8) {
        if self.phase == LifecyclePhase::Splash {
            debug!("Startup {progress}%: {message}");
            self.splash.update_status(message, progress.min(100));
        }
    }

    pub fn transition_to_main(&mut self) {
        match self.phase {
            LifecyclePhase::NotStarted => {
                self.main.show();
                self.phase = LifecyclePhase::Main;
            }
            LifecyclePhase::Splash => {
                self.splash.close();
                self.main.show();
                self.phase = LifecyclePhase::Main;
            }
            LifecyclePhase::Main | LifecyclePhase::Closed => {}
        }
    }

    pub fn main_surface(&mut self) -> Option<&mut M> {
        (self.phase == LifecyclePhase::Main).then_some(&mut self.main)
    }

    pub fn shutdown(&mut self) {
        match self.phase {
            LifecyclePhase::Splash => self.splash.close(),
            LifecyclePhase::Main => self.main.close(),
            LifecyclePhase::NotStarted | LifecyclePhase::Closed => {}
        }
        self.phase = LifecyclePhase::Closed;
    }
}

/// Startup progress printed to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleSplash;

impl Surface for ConsoleSplash {
    fn show(&mut self) {
        eprintln!("Marwan Management CRM");
    }

    fn update_status(&mut self, message: &str, progress: u8) {
        eprintln!("[{progress:>3}%] {message}");
    }

    fn close(&mut self) {}
}

/// The main surface of the terminal front end.
#[derive(Debug)]
pub struct ConsoleMain {
    version: &'static str,
}

impl ConsoleMain {
    #[must_use]
    pub fn new(version: &'static str) -> Self {
        Self { version }
    }
}

impl Surface for ConsoleMain {
    fn show(&mut self) {
        println!("Marwan Management CRM v{} ready", self.version);
    }

    fn update_status(&mut self, message: &str, _progress: u8) {
        println!("{message}");
    }

    fn close(&mut self) {
        println!("Goodbye");
    }
}
