fn main() {
    // migrations are embedded by `sqlx::migrate!`
    println!("cargo:rerun-if-changed=migrations");
    // as are the page templates
    println!("cargo:rerun-if-changed=templates");
}
