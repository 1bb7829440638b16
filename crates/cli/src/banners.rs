//! stdout banners for each error kind in the error-handling design.

pub fn print_parse_errors(msgs: &[String]) {
    println!("\nMutation gone wrong \u{1F615}. Below error messages may help!\n");
    println!("parser errors:");
    for msg in msgs {
        println!("\t{}\t", msg);
    }
}

pub fn print_compiler_error(msg: &str) {
    println!("\nBytes are small but confusing \u{1F615}. Below error messages may help!\n");
    println!("compiler error:");
    println!("\t{}\t", msg);
}

pub fn print_vm_error(msg: &str) {
    println!("\nEven machines aren't perfect \u{1F615}. Below error messages may help!\n");
    println!("vm error:");
    println!("\t{}\t", msg);
}

pub fn print_signature_error(msg: &str) {
    println!("\nThis artifact isn't what it claims to be \u{1F615}. Below error messages may help!\n");
    println!("signature error:");
    println!("\t{}\t", msg);
}

pub fn print_io_error(msg: &str) {
    eprintln!("io error: {}", msg);
}
