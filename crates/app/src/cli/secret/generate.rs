use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use tally_app::auth::SigningKey;

pub(crate) fn run() {
    let key = SigningKey::generate();

    println!("session_secret: {}", URL_SAFE_NO_PAD.encode(key.as_bytes()));
    println!("store this secret now; it is only shown once");
}
