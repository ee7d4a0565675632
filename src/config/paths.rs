//! XDG Base Directory lookups for configuration files.

pub mod xdg_root;
