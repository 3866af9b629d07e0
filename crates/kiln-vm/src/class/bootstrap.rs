//! Bootstrap class universe
//!
//! The classes the VM itself depends on, in definition order (superclasses
//! before subclasses). Native methods declared here must all resolve in the
//! native registry or boot fails.

use super::{AccessFlags, ClassDef};

const OBJECT: &str = "Ljava/lang/Object;";
const CLASS: &str = "Ljava/lang/Class;";
const STRING: &str = "Ljava/lang/String;";

fn private_final() -> AccessFlags {
    AccessFlags::PRIVATE | AccessFlags::FINAL
}

fn public_final() -> AccessFlags {
    AccessFlags::PUBLIC | AccessFlags::FINAL
}

fn wrapper(name: &str, desc: &str, super_name: &str) -> ClassDef {
    ClassDef::new(name)
        .extends(super_name)
        .flags(public_final())
        .implements("java/io/Serializable")
        .field_with("value", desc, private_final())
}

fn member(name: &str) -> ClassDef {
    ClassDef::new(name)
        .flags(public_final())
        .field_with("declaringClass", CLASS, AccessFlags::PRIVATE)
        .field_with("name", STRING, AccessFlags::PRIVATE)
        .field_with("slot", "I", AccessFlags::PRIVATE)
}

/// Bootstrap class definitions, superclasses first
pub fn bootstrap_classes() -> Vec<ClassDef> {
    let mut classes = vec![
        ClassDef::new("java/lang/Object").root(),
        ClassDef::interface("java/io/Serializable"),
        ClassDef::interface("java/lang/Cloneable"),
        ClassDef::new("java/security/ProtectionDomain"),
        ClassDef::new("java/lang/Class")
            .flags(public_final())
            .implements("java/io/Serializable")
            .field_with("pd", "Ljava/security/ProtectionDomain;", AccessFlags::PRIVATE),
        ClassDef::new("java/lang/String")
            .flags(public_final())
            .implements("java/io/Serializable"),
        ClassDef::new("java/lang/ClassLoader")
            .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .method("loadClass", "(Ljava/lang/String;)Ljava/lang/Class;", Vec::new()),
        ClassDef::new("java/util/Properties").method(
            "setProperty",
            "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/Object;",
            Vec::new(),
        ),
        ClassDef::new("java/lang/Number").flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT),
        wrapper("java/lang/Boolean", "Z", "java/lang/Object"),
        wrapper("java/lang/Character", "C", "java/lang/Object"),
        wrapper("java/lang/Byte", "B", "java/lang/Number"),
        wrapper("java/lang/Short", "S", "java/lang/Number"),
        wrapper("java/lang/Integer", "I", "java/lang/Number"),
        wrapper("java/lang/Long", "J", "java/lang/Number"),
        wrapper("java/lang/Float", "F", "java/lang/Number"),
        wrapper("java/lang/Double", "D", "java/lang/Number"),
        ClassDef::new("java/lang/Void").flags(public_final()),
        ClassDef::new("java/lang/Throwable")
            .implements("java/io/Serializable")
            .field_with("detailMessage", STRING, AccessFlags::PRIVATE)
            .field_with("cause", "Ljava/lang/Throwable;", AccessFlags::PRIVATE)
            .field_with("vmState", "Ljava/lang/VMThrowable;", AccessFlags::TRANSIENT)
            .method("fillInStackTrace", "()Ljava/lang/Throwable;", Vec::new()),
        ClassDef::new("java/lang/Exception").extends("java/lang/Throwable"),
        ClassDef::new("java/lang/Error").extends("java/lang/Throwable"),
        ClassDef::new("java/lang/StackTraceElement")
            .flags(public_final())
            .implements("java/io/Serializable")
            .field_with("fileName", STRING, private_final())
            .field_with("lineNumber", "I", private_final())
            .field_with("declaringClass", STRING, private_final())
            .field_with("methodName", STRING, private_final())
            .field_with("isNative", "Z", private_final()),
        ClassDef::new("java/lang/Thread")
            .field_with("vmThread", "Ljava/lang/VMThread;", AccessFlags::empty())
            .field_with("name", STRING, AccessFlags::empty())
            .field_with("priority", "I", AccessFlags::empty())
            .field_with("daemon", "Z", AccessFlags::empty())
            .method("run", "()V", Vec::new()),
    ];
    classes.extend(native_classes());
    classes
}

/// Classes whose natives the VM implements
fn native_classes() -> Vec<ClassDef> {
    let field_access = "(Ljava/lang/Object;Ljava/lang/Class;Ljava/lang/Class;I)";
    let mut field_class = member("java/lang/reflect/Field")
        .native_method("getFieldModifiers", "(Ljava/lang/Class;I)I")
        .native_method("getField", format!("{}{}", field_access, OBJECT))
        .native_method(
            "setField",
            "(Ljava/lang/Object;Ljava/lang/Class;Ljava/lang/Class;ILjava/lang/Object;)V",
        );
    for ty in ['Z', 'B', 'C', 'S', 'I', 'F', 'J', 'D'] {
        field_class = field_class
            .native_method(format!("get{}Field", ty), format!("{}{}", field_access, ty))
            .native_method(
                format!("set{}Field", ty),
                format!("(Ljava/lang/Object;Ljava/lang/Class;Ljava/lang/Class;I{})V", ty),
            );
    }

    vec![
        ClassDef::new("java/lang/VMObject")
            .flags(AccessFlags::FINAL)
            .static_native("getClass", "(Ljava/lang/Object;)Ljava/lang/Class;")
            .static_native("clone", "(Ljava/lang/Cloneable;)Ljava/lang/Object;")
            .static_native("wait", "(Ljava/lang/Object;JI)V")
            .static_native("notify", "(Ljava/lang/Object;)V")
            .static_native("notifyAll", "(Ljava/lang/Object;)V"),
        ClassDef::new("java/lang/VMSystem")
            .flags(AccessFlags::FINAL)
            .static_native("arraycopy", "(Ljava/lang/Object;ILjava/lang/Object;II)V")
            .static_native("identityHashCode", "(Ljava/lang/Object;)I"),
        ClassDef::new("java/lang/VMRuntime")
            .flags(AccessFlags::FINAL)
            .static_native("freeMemory", "()J")
            .static_native("totalMemory", "()J")
            .static_native("maxMemory", "()J")
            .static_native("gc", "()V")
            .static_native("runFinalization", "()V")
            .static_native("exit", "(I)V")
            .static_native("nativeLoad", "(Ljava/lang/String;)I")
            .static_native("mapLibraryName", "(Ljava/lang/String;)Ljava/lang/String;"),
        ClassDef::new("java/lang/VMClass")
            .flags(AccessFlags::FINAL)
            .static_native("isInstance", "(Ljava/lang/Class;Ljava/lang/Object;)Z")
            .static_native("isAssignableFrom", "(Ljava/lang/Class;Ljava/lang/Class;)Z")
            .static_native("isInterface", "(Ljava/lang/Class;)Z")
            .static_native("isPrimitive", "(Ljava/lang/Class;)Z")
            .static_native("isArray", "(Ljava/lang/Class;)Z")
            .static_native("isSynthetic", "(Ljava/lang/Class;)Z")
            .static_native("isAnnotation", "(Ljava/lang/Class;)Z")
            .static_native("isEnum", "(Ljava/lang/Class;)Z")
            .static_native("getSuperclass", "(Ljava/lang/Class;)Ljava/lang/Class;")
            .static_native("getComponentType", "(Ljava/lang/Class;)Ljava/lang/Class;")
            .static_native("getName", "(Ljava/lang/Class;)Ljava/lang/String;")
            .static_native("getDeclaredClasses", "(Ljava/lang/Class;Z)[Ljava/lang/Class;")
            .static_native("getDeclaringClass", "(Ljava/lang/Class;)Ljava/lang/Class;")
            .static_native(
                "getDeclaredConstructors",
                "(Ljava/lang/Class;Z)[Ljava/lang/reflect/Constructor;",
            )
            .static_native("getDeclaredMethods", "(Ljava/lang/Class;Z)[Ljava/lang/reflect/Method;")
            .static_native("getDeclaredFields", "(Ljava/lang/Class;Z)[Ljava/lang/reflect/Field;")
            .static_native("getInterfaces", "(Ljava/lang/Class;)[Ljava/lang/Class;")
            .static_native("getClassLoader", "(Ljava/lang/Class;)Ljava/lang/ClassLoader;")
            .static_native("getModifiers", "(Ljava/lang/Class;Z)I")
            .static_native(
                "forName",
                "(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;",
            )
            .static_native("throwException", "(Ljava/lang/Throwable;)V")
            .static_native("hasClassInitializer", "(Ljava/lang/Class;)Z"),
        ClassDef::new("java/lang/VMString")
            .flags(AccessFlags::FINAL)
            .static_native("intern", "(Ljava/lang/String;)Ljava/lang/String;"),
        ClassDef::new("java/lang/VMThread")
            .flags(AccessFlags::FINAL)
            .field_with("thread", "Ljava/lang/Thread;", AccessFlags::FINAL)
            .static_native("currentThread", "()Ljava/lang/Thread;")
            .static_native("create", "(Ljava/lang/Thread;J)V")
            .static_native("sleep", "(JI)V")
            .static_native("yield", "()V")
            .static_native("interrupted", "()Z")
            .static_native("holdsLock", "(Ljava/lang/Object;)Z")
            .native_method("interrupt", "()V")
            .native_method("isAlive", "()Z")
            .native_method("isInterrupted", "()Z")
            .native_method("nativeSetPriority", "(I)V"),
        ClassDef::new("java/lang/VMThrowable")
            .flags(AccessFlags::FINAL)
            .static_native(
                "fillInStackTrace",
                "(Ljava/lang/Throwable;)Ljava/lang/VMThrowable;",
            )
            .native_method(
                "getStackTrace",
                "(Ljava/lang/Throwable;)[Ljava/lang/StackTraceElement;",
            ),
        ClassDef::new("java/lang/VMClassLoader")
            .flags(AccessFlags::FINAL)
            .static_native("loadClass", "(Ljava/lang/String;Z)Ljava/lang/Class;")
            .static_native("getPrimitiveClass", "(C)Ljava/lang/Class;")
            .static_native(
                "defineClass",
                "(Ljava/lang/ClassLoader;Ljava/lang/String;[BIILjava/security/ProtectionDomain;)Ljava/lang/Class;",
            )
            .static_native(
                "findLoadedClass",
                "(Ljava/lang/ClassLoader;Ljava/lang/String;)Ljava/lang/Class;",
            )
            .static_native("resolveClass", "(Ljava/lang/Class;)V")
            .static_native("getBootClassPathSize", "()I")
            .static_native(
                "getBootClassPathResource",
                "(Ljava/lang/String;I)Ljava/lang/String;",
            ),
        field_class,
        member("java/lang/reflect/Method")
            .native_method(
                "invokeNative",
                "(Ljava/lang/Object;[Ljava/lang/Object;Ljava/lang/Class;I)Ljava/lang/Object;",
            )
            .native_method("getMethodModifiers", "(Ljava/lang/Class;I)I"),
        member("java/lang/reflect/Constructor")
            .native_method(
                "constructNative",
                "([Ljava/lang/Object;Ljava/lang/Class;I)Ljava/lang/Object;",
            )
            .native_method("getConstructorModifiers", "(Ljava/lang/Class;I)I"),
        ClassDef::new("gnu/classpath/VMSystemProperties")
            .flags(AccessFlags::FINAL)
            .static_native("preInit", "(Ljava/util/Properties;)V")
            .static_native("postInit", "(Ljava/util/Properties;)V"),
        ClassDef::new("gnu/classpath/VMStackWalker")
            .flags(AccessFlags::FINAL)
            .static_native("getClassContext", "()[Ljava/lang/Class;")
            .static_native("getCallingClass", "()Ljava/lang/Class;")
            .static_native("getCallingClassLoader", "()Ljava/lang/ClassLoader;"),
        ClassDef::new("java/security/VMAccessController")
            .flags(AccessFlags::FINAL)
            .static_native("getStack", "()[[Ljava/lang/Object;"),
    ]
}
