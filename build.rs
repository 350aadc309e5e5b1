fn main() {
    // Embed the application manifest when building with the MSVC Windows toolchain.
    // PerMonitorV2 makes GetDpiForWindow report the monitor scale; the Windows 8+
    // compatibility entries allow layered (translucent) child windows.
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        println!("cargo:rerun-if-changed=winembed.manifest");
        println!("cargo:rustc-link-arg=/MANIFEST:EMBED");
        println!("cargo:rustc-link-arg=/MANIFESTINPUT:winembed.manifest");
        println!("cargo:rustc-link-arg=/MANIFESTUAC:level='asInvoker' uiAccess='false'");
    }
    #[cfg(all(target_os = "windows", not(target_env = "msvc")))]
    {
        println!(
            "cargo:warning=Manifest embedding not configured for non-MSVC toolchain; winembed.manifest may be ignored (layered child windows need it)."
        );
    }
}
