pub mod app;
pub mod play_controls;
pub mod settings_panel;
pub mod spectrogram;
