// Terminal front-end: key presses in, DisplayState out.
pub mod grid;
pub mod input;
pub mod mode;
pub mod view;
