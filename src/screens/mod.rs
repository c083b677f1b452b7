//! Screen tree. Each screen owns its children and reports results upward
//! through its `layout` return value; [`main_screen::MainScreen`] is the
//! root the frame loop drives.

pub mod choice;
pub mod descriptor;
pub mod dialog;
pub mod engrave;
pub mod keyboard;
pub mod main_screen;
pub mod scan;
pub mod seed;
