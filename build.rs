fn main() {
    #[cfg(windows)]
    {
        use std::env;
        use std::path::PathBuf;

        let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
        let ico_path = PathBuf::from(&manifest_dir)
            .join("resources")
            .join("updater.ico");
        println!("cargo:rerun-if-changed={}", ico_path.display());

        let mut res = winres::WindowsResource::new();
        res.set("ProductName", "FIR Controller Updater");
        res.set("FileDescription", "Applies staged FIR Controller updates");

        // ICO 파일이 있을 때만 아이콘을 넣는다
        if ico_path.exists() {
            res.set_icon(&ico_path.to_string_lossy());
        } else {
            println!("cargo:warning=Icon not found at {}, building without icon", ico_path.display());
        }

        if let Err(e) = res.compile() {
            println!("cargo:warning=Failed to compile resources: {}", e);
        }
    }
}
