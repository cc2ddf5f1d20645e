use std::{env, fs::File, io::Read, sync::Arc};

use declass::classfile::parse_class_file;
use declass::decompile::{CodeStream, Decompiler};

fn main() {
    let path = env::args().nth(1).expect("usage: declass <path to .class>");

    let mut bytes = Vec::new();
    File::open(path)
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();

    let class_file = Arc::new(parse_class_file(&bytes).unwrap());
    let decompiler = Decompiler::default();

    println!("class {}", class_file.name());

    for method in class_file.methods() {
        let Ok(code_attribute) = method.code() else {
            continue;
        };

        println!("\n{}{}", method.name(), method.raw_descriptor());

        let code = Arc::clone(code_attribute.code());
        let mut stream = CodeStream::new(&code);

        match decompiler.decompile(&class_file, method, &mut stream) {
            Ok(statements) => {
                for statement in statements {
                    println!("  {statement:?}");
                }
            }
            Err(error) => println!("  !! {error}"),
        }
    }
}
