/// Deterministic avatar image for a user identity.
pub fn avatar_url(seed: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/adventurer/svg?seed={}",
        urlencoding::encode(seed)
    )
}
