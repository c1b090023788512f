// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

fn main() {
    println!(r#"cargo:rustc-check-cfg=cfg(intros_has_native_rmw)"#);
    println!("cargo:rerun-if-changed=build.rs");

    let target = std::env::var("TARGET").unwrap();
    match target.as_str() {
        "thumbv6m-none-eabi" => {
            // No atomic read-modify-write; the tick ISR falls back to a
            // critical section.
        }
        t if t.starts_with("thumbv") => {
            println!("cargo:rustc-cfg=intros_has_native_rmw");
        }
        _ => {
            // Host builds (unit tests, docs) have the full set of atomics.
            println!("cargo:rustc-cfg=intros_has_native_rmw");
        }
    }
}
