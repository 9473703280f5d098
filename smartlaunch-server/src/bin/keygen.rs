//! Print a fresh session secret for `SMARTLAUNCH_SESSION_SECRET`.
//!
//! 32 bytes from the OS-seeded CSPRNG, hex encoded (64 characters).

fn main() {
    println!("{}", smartlaunch_server::session::generate_secret());
}
