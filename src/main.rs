fn main() -> std::process::ExitCode {
    saveblocker_lib::run()
}
