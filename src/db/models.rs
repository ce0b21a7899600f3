/// Database row types. These correspond 1:1 to the SQLite schema defined
/// in migrations.rs.
///
/// User record in the users table. `password_hash` is the salted digest
/// produced by auth::password, never a plaintext password.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}
