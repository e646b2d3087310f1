fn main() {
    chess_engine::xboard::run_xboard();
}
