fn main() {
    pegtrace::cli::run();
}
