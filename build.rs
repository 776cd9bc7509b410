fn main() {
    // The captive portal page is embedded with include_str!.
    println!("cargo:rerun-if-changed=assets/portal.html");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
