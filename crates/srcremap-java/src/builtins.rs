//! Built-in knowledge of the core `java.lang`, `java.io` and `java.util`
//! types.
//!
//! Lets descriptors and common calls resolve without a JDK on the classpath.
//! A classpath class with the same name replaces the built-in one.
//!
//! Table syntax, one entry per line:
//!
//! ```text
//! class|interface|enum|annotation <binary> [extends <super>] [implements <a,b>]
//! class|interface <binary> sig <class signature>
//!   f <name> <field signature> [static]
//!   m <name> <method signature> [static] [varargs] [default]
//! ```
//!
//! Signatures use the class file `Signature` grammar (see [`crate::generic`]);
//! a plain descriptor is a signature too. Interface methods are abstract
//! unless `static` or `default`.

use crate::generic::{parse_class_signature, parse_field_signature, parse_method_signature, JType};
use crate::model::{FieldDecl, MethodDecl, Origin, TypeDecl, TypeIndex, TypeKind};

const TABLE: &str = r#"
class java.lang.Object
  m <init> ()V
  m equals (Ljava/lang/Object;)Z
  m hashCode ()I
  m toString ()Ljava/lang/String;
  m getClass ()Ljava/lang/Class;
  m clone ()Ljava/lang/Object;
  m finalize ()V
  m notify ()V
  m notifyAll ()V
  m wait ()V
  m wait (J)V
  m wait (JI)V
interface java.lang.CharSequence
  m length ()I
  m charAt (I)C
  m subSequence (II)Ljava/lang/CharSequence;
  m isEmpty ()Z
interface java.lang.Comparable sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m compareTo (TT;)I
interface java.lang.Iterable sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m iterator ()Ljava/util/Iterator<TT;>;
  m forEach (Ljava/util/function/Consumer<-TT;>;)V default
interface java.lang.Runnable
  m run ()V
interface java.lang.AutoCloseable
  m close ()V
interface java.lang.Cloneable
interface java.lang.Appendable
interface java.io.Serializable
interface java.io.Closeable extends java.lang.AutoCloseable
interface java.lang.annotation.Annotation
  m annotationType ()Ljava/lang/Class;
class java.lang.String sig Ljava/lang/Object;Ljava/io/Serializable;Ljava/lang/Comparable<Ljava/lang/String;>;Ljava/lang/CharSequence;
  m <init> ()V
  m <init> (Ljava/lang/String;)V
  m <init> ([C)V
  m <init> ([B)V
  m length ()I
  m isEmpty ()Z
  m charAt (I)C
  m equals (Ljava/lang/Object;)Z
  m equalsIgnoreCase (Ljava/lang/String;)Z
  m compareTo (Ljava/lang/String;)I
  m hashCode ()I
  m toString ()Ljava/lang/String;
  m substring (I)Ljava/lang/String;
  m substring (II)Ljava/lang/String;
  m indexOf (I)I
  m indexOf (Ljava/lang/String;)I
  m lastIndexOf (I)I
  m lastIndexOf (Ljava/lang/String;)I
  m startsWith (Ljava/lang/String;)Z
  m endsWith (Ljava/lang/String;)Z
  m contains (Ljava/lang/CharSequence;)Z
  m concat (Ljava/lang/String;)Ljava/lang/String;
  m replace (CC)Ljava/lang/String;
  m replace (Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;
  m trim ()Ljava/lang/String;
  m strip ()Ljava/lang/String;
  m toLowerCase ()Ljava/lang/String;
  m toUpperCase ()Ljava/lang/String;
  m split (Ljava/lang/String;)[Ljava/lang/String;
  m toCharArray ()[C
  m getBytes ()[B
  m intern ()Ljava/lang/String;
  m format (Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/String; static varargs
  m join (Ljava/lang/CharSequence;[Ljava/lang/CharSequence;)Ljava/lang/String; static varargs
  m valueOf (Ljava/lang/Object;)Ljava/lang/String; static
  m valueOf (I)Ljava/lang/String; static
  m valueOf (J)Ljava/lang/String; static
  m valueOf (C)Ljava/lang/String; static
  m valueOf (Z)Ljava/lang/String; static
  m valueOf (D)Ljava/lang/String; static
  m valueOf (F)Ljava/lang/String; static
class java.lang.StringBuilder implements java.lang.CharSequence,java.lang.Appendable,java.io.Serializable
  m <init> ()V
  m <init> (I)V
  m <init> (Ljava/lang/String;)V
  m append (Ljava/lang/Object;)Ljava/lang/StringBuilder;
  m append (Ljava/lang/String;)Ljava/lang/StringBuilder;
  m append (Ljava/lang/CharSequence;)Ljava/lang/StringBuilder;
  m append (C)Ljava/lang/StringBuilder;
  m append (I)Ljava/lang/StringBuilder;
  m append (J)Ljava/lang/StringBuilder;
  m append (Z)Ljava/lang/StringBuilder;
  m append (F)Ljava/lang/StringBuilder;
  m append (D)Ljava/lang/StringBuilder;
  m insert (ILjava/lang/String;)Ljava/lang/StringBuilder;
  m reverse ()Ljava/lang/StringBuilder;
  m setLength (I)V
  m length ()I
  m charAt (I)C
  m toString ()Ljava/lang/String;
class java.lang.Class sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m getName ()Ljava/lang/String;
  m getSimpleName ()Ljava/lang/String;
  m isInstance (Ljava/lang/Object;)Z
  m cast (Ljava/lang/Object;)TT;
class java.lang.Enum sig <E:Ljava/lang/Enum<TE;>;>Ljava/lang/Object;Ljava/lang/Comparable<TE;>;Ljava/io/Serializable;
  m name ()Ljava/lang/String;
  m ordinal ()I
  m toString ()Ljava/lang/String;
  m compareTo (TE;)I
  m getDeclaringClass ()Ljava/lang/Class<TE;>;
  m valueOf <T:Ljava/lang/Enum<TT;>;>(Ljava/lang/Class<TT;>;Ljava/lang/String;)TT; static
class java.lang.Record
  m equals (Ljava/lang/Object;)Z
  m hashCode ()I
  m toString ()Ljava/lang/String;
class java.lang.Number implements java.io.Serializable
  m intValue ()I
  m longValue ()J
  m floatValue ()F
  m doubleValue ()D
  m byteValue ()B
  m shortValue ()S
class java.lang.Integer sig Ljava/lang/Number;Ljava/lang/Comparable<Ljava/lang/Integer;>;
  f MAX_VALUE I static
  f MIN_VALUE I static
  m valueOf (I)Ljava/lang/Integer; static
  m valueOf (Ljava/lang/String;)Ljava/lang/Integer; static
  m parseInt (Ljava/lang/String;)I static
  m toString (I)Ljava/lang/String; static
  m compare (II)I static
  m compareTo (Ljava/lang/Integer;)I
class java.lang.Long extends java.lang.Number implements java.lang.Comparable
  f MAX_VALUE J static
  f MIN_VALUE J static
  m valueOf (J)Ljava/lang/Long; static
  m parseLong (Ljava/lang/String;)J static
  m compare (JJ)I static
class java.lang.Short extends java.lang.Number implements java.lang.Comparable
  m valueOf (S)Ljava/lang/Short; static
class java.lang.Byte extends java.lang.Number implements java.lang.Comparable
  m valueOf (B)Ljava/lang/Byte; static
class java.lang.Float extends java.lang.Number implements java.lang.Comparable
  m valueOf (F)Ljava/lang/Float; static
  m parseFloat (Ljava/lang/String;)F static
  m compare (FF)I static
class java.lang.Double extends java.lang.Number implements java.lang.Comparable
  m valueOf (D)Ljava/lang/Double; static
  m parseDouble (Ljava/lang/String;)D static
  m compare (DD)I static
class java.lang.Boolean implements java.io.Serializable,java.lang.Comparable
  f TRUE Ljava/lang/Boolean; static
  f FALSE Ljava/lang/Boolean; static
  m valueOf (Z)Ljava/lang/Boolean; static
  m parseBoolean (Ljava/lang/String;)Z static
  m booleanValue ()Z
class java.lang.Character implements java.io.Serializable,java.lang.Comparable
  m valueOf (C)Ljava/lang/Character; static
  m isDigit (C)Z static
  m isLetter (C)Z static
  m isWhitespace (C)Z static
  m toUpperCase (C)C static
  m toLowerCase (C)C static
  m charValue ()C
class java.lang.Void
class java.lang.Math
  f PI D static
  f E D static
  m abs (I)I static
  m abs (J)J static
  m abs (F)F static
  m abs (D)D static
  m max (II)I static
  m max (JJ)J static
  m max (FF)F static
  m max (DD)D static
  m min (II)I static
  m min (JJ)J static
  m min (FF)F static
  m min (DD)D static
  m sqrt (D)D static
  m pow (DD)D static
  m floor (D)D static
  m ceil (D)D static
  m round (D)J static
  m round (F)I static
  m random ()D static
class java.io.PrintStream
  m println ()V
  m println (Z)V
  m println (C)V
  m println (I)V
  m println (J)V
  m println (F)V
  m println (D)V
  m println ([C)V
  m println (Ljava/lang/String;)V
  m println (Ljava/lang/Object;)V
  m print (Z)V
  m print (C)V
  m print (I)V
  m print (J)V
  m print (F)V
  m print (D)V
  m print (Ljava/lang/String;)V
  m print (Ljava/lang/Object;)V
  m printf (Ljava/lang/String;[Ljava/lang/Object;)Ljava/io/PrintStream; varargs
  m flush ()V
class java.io.InputStream implements java.io.Closeable
  m read ()I
class java.lang.System
  f out Ljava/io/PrintStream; static
  f err Ljava/io/PrintStream; static
  f in Ljava/io/InputStream; static
  m currentTimeMillis ()J static
  m nanoTime ()J static
  m arraycopy (Ljava/lang/Object;ILjava/lang/Object;II)V static
  m exit (I)V static
  m getProperty (Ljava/lang/String;)Ljava/lang/String; static
  m lineSeparator ()Ljava/lang/String; static
class java.lang.Thread implements java.lang.Runnable
  m <init> ()V
  m <init> (Ljava/lang/Runnable;)V
  m start ()V
  m run ()V
  m join ()V
  m interrupt ()V
  m sleep (J)V static
  m currentThread ()Ljava/lang/Thread; static
class java.lang.Throwable implements java.io.Serializable
  m <init> ()V
  m <init> (Ljava/lang/String;)V
  m <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m <init> (Ljava/lang/Throwable;)V
  m getMessage ()Ljava/lang/String;
  m getCause ()Ljava/lang/Throwable;
  m printStackTrace ()V
  m addSuppressed (Ljava/lang/Throwable;)V
class java.lang.Exception extends java.lang.Throwable
  m <init> ()V
  m <init> (Ljava/lang/String;)V
  m <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m <init> (Ljava/lang/Throwable;)V
class java.lang.Error extends java.lang.Throwable
  m <init> ()V
  m <init> (Ljava/lang/String;)V
class java.lang.RuntimeException extends java.lang.Exception
  m <init> ()V
  m <init> (Ljava/lang/String;)V
  m <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m <init> (Ljava/lang/Throwable;)V
class java.lang.IllegalArgumentException extends java.lang.RuntimeException
  m <init> ()V
  m <init> (Ljava/lang/String;)V
class java.lang.IllegalStateException extends java.lang.RuntimeException
  m <init> ()V
  m <init> (Ljava/lang/String;)V
class java.lang.UnsupportedOperationException extends java.lang.RuntimeException
  m <init> ()V
  m <init> (Ljava/lang/String;)V
class java.lang.NullPointerException extends java.lang.RuntimeException
  m <init> ()V
  m <init> (Ljava/lang/String;)V
class java.lang.ClassCastException extends java.lang.RuntimeException
class java.lang.ArithmeticException extends java.lang.RuntimeException
class java.lang.IndexOutOfBoundsException extends java.lang.RuntimeException
  m <init> ()V
  m <init> (Ljava/lang/String;)V
class java.lang.ArrayIndexOutOfBoundsException extends java.lang.IndexOutOfBoundsException
class java.lang.InterruptedException extends java.lang.Exception
class java.lang.CloneNotSupportedException extends java.lang.Exception
class java.io.IOException extends java.lang.Exception
  m <init> ()V
  m <init> (Ljava/lang/String;)V
annotation java.lang.Override
annotation java.lang.Deprecated
annotation java.lang.FunctionalInterface
annotation java.lang.SafeVarargs
annotation java.lang.SuppressWarnings
  m value ()[Ljava/lang/String;
interface java.util.Iterator sig <E:Ljava/lang/Object;>Ljava/lang/Object;
  m hasNext ()Z
  m next ()TE;
  m remove ()V default
interface java.util.Collection sig <E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Iterable<TE;>;
  m size ()I
  m isEmpty ()Z
  m contains (Ljava/lang/Object;)Z
  m add (TE;)Z
  m remove (Ljava/lang/Object;)Z
  m addAll (Ljava/util/Collection<+TE;>;)Z
  m clear ()V
  m toArray ()[Ljava/lang/Object;
  m stream ()Ljava/util/stream/Stream<TE;>; default
interface java.util.List sig <E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Collection<TE;>;
  m get (I)TE;
  m set (ITE;)TE;
  m add (ITE;)V
  m remove (I)TE;
  m indexOf (Ljava/lang/Object;)I
  m subList (II)Ljava/util/List<TE;>;
  m sort (Ljava/util/Comparator<-TE;>;)V default
  m of <E:Ljava/lang/Object;>()Ljava/util/List<TE;>; static
  m of <E:Ljava/lang/Object;>([TE;)Ljava/util/List<TE;>; static varargs
  m copyOf <E:Ljava/lang/Object;>(Ljava/util/Collection<+TE;>;)Ljava/util/List<TE;>; static
class java.util.ArrayList sig <E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/List<TE;>;
  m <init> ()V
  m <init> (I)V
  m <init> (Ljava/util/Collection<+TE;>;)V
class java.util.LinkedList sig <E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/List<TE;>;
  m <init> ()V
  m addFirst (TE;)V
  m getFirst ()TE;
interface java.util.Set sig <E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Collection<TE;>;
  m of <E:Ljava/lang/Object;>([TE;)Ljava/util/Set<TE;>; static varargs
class java.util.HashSet sig <E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Set<TE;>;
  m <init> ()V
  m <init> (Ljava/util/Collection<+TE;>;)V
class java.util.LinkedHashSet sig <E:Ljava/lang/Object;>Ljava/util/HashSet<TE;>;Ljava/util/Set<TE;>;
  m <init> ()V
interface java.util.Map sig <K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;
  m size ()I
  m isEmpty ()Z
  m get (Ljava/lang/Object;)TV;
  m getOrDefault (Ljava/lang/Object;TV;)TV; default
  m put (TK;TV;)TV;
  m putIfAbsent (TK;TV;)TV; default
  m remove (Ljava/lang/Object;)TV;
  m containsKey (Ljava/lang/Object;)Z
  m containsValue (Ljava/lang/Object;)Z
  m keySet ()Ljava/util/Set<TK;>;
  m values ()Ljava/util/Collection<TV;>;
  m entrySet ()Ljava/util/Set<Ljava/util/Map$Entry<TK;TV;>;>;
  m computeIfAbsent (TK;Ljava/util/function/Function<-TK;+TV;>;)TV; default
  m forEach (Ljava/util/function/BiConsumer<-TK;-TV;>;)V default
  m clear ()V
  m of <K:Ljava/lang/Object;V:Ljava/lang/Object;>()Ljava/util/Map<TK;TV;>; static
interface java.util.Map$Entry sig <K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;
  m getKey ()TK;
  m getValue ()TV;
  m setValue (TV;)TV;
class java.util.HashMap sig <K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Map<TK;TV;>;
  m <init> ()V
  m <init> (I)V
class java.util.LinkedHashMap sig <K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/util/HashMap<TK;TV;>;Ljava/util/Map<TK;TV;>;
  m <init> ()V
class java.util.TreeMap sig <K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Map<TK;TV;>;
  m <init> ()V
interface java.util.Comparator sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m compare (TT;TT;)I
  m reversed ()Ljava/util/Comparator<TT;>; default
  m comparing <T:Ljava/lang/Object;U::Ljava/lang/Comparable<-TU;>;>(Ljava/util/function/Function<-TT;+TU;>;)Ljava/util/Comparator<TT;>; static
class java.util.Optional sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m of <T:Ljava/lang/Object;>(TT;)Ljava/util/Optional<TT;>; static
  m ofNullable <T:Ljava/lang/Object;>(TT;)Ljava/util/Optional<TT;>; static
  m empty <T:Ljava/lang/Object;>()Ljava/util/Optional<TT;>; static
  m isPresent ()Z
  m isEmpty ()Z
  m get ()TT;
  m orElse (TT;)TT;
  m ifPresent (Ljava/util/function/Consumer<-TT;>;)V
  m map <U:Ljava/lang/Object;>(Ljava/util/function/Function<-TT;+TU;>;)Ljava/util/Optional<TU;>;
class java.util.Objects
  m equals (Ljava/lang/Object;Ljava/lang/Object;)Z static
  m hash ([Ljava/lang/Object;)I static varargs
  m isNull (Ljava/lang/Object;)Z static
  m requireNonNull <T:Ljava/lang/Object;>(TT;)TT; static
class java.util.Arrays
  m asList <T:Ljava/lang/Object;>([TT;)Ljava/util/List<TT;>; static varargs
  m sort ([I)V static
  m toString ([Ljava/lang/Object;)Ljava/lang/String; static
class java.util.Collections
  m emptyList <T:Ljava/lang/Object;>()Ljava/util/List<TT;>; static
  m unmodifiableList <T:Ljava/lang/Object;>(Ljava/util/List<+TT;>;)Ljava/util/List<TT;>; static
  m sort <T::Ljava/lang/Comparable<-TT;>;>(Ljava/util/List<TT;>;)V static
interface java.util.function.Function sig <T:Ljava/lang/Object;R:Ljava/lang/Object;>Ljava/lang/Object;
  m apply (TT;)TR;
  m andThen <V:Ljava/lang/Object;>(Ljava/util/function/Function<-TR;+TV;>;)Ljava/util/function/Function<TT;TV;>; default
  m identity <T:Ljava/lang/Object;>()Ljava/util/function/Function<TT;TT;>; static
interface java.util.function.BiFunction sig <T:Ljava/lang/Object;U:Ljava/lang/Object;R:Ljava/lang/Object;>Ljava/lang/Object;
  m apply (TT;TU;)TR;
interface java.util.function.UnaryOperator sig <T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/function/Function<TT;TT;>;
interface java.util.function.Consumer sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m accept (TT;)V
interface java.util.function.BiConsumer sig <T:Ljava/lang/Object;U:Ljava/lang/Object;>Ljava/lang/Object;
  m accept (TT;TU;)V
interface java.util.function.Supplier sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m get ()TT;
interface java.util.function.Predicate sig <T:Ljava/lang/Object;>Ljava/lang/Object;
  m test (TT;)Z
  m negate ()Ljava/util/function/Predicate<TT;>; default
interface java.util.stream.Stream sig <T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/AutoCloseable;
  m filter (Ljava/util/function/Predicate<-TT;>;)Ljava/util/stream/Stream<TT;>;
  m map <R:Ljava/lang/Object;>(Ljava/util/function/Function<-TT;+TR;>;)Ljava/util/stream/Stream<TR;>;
  m forEach (Ljava/util/function/Consumer<-TT;>;)V
  m toList ()Ljava/util/List<TT;>; default
  m findFirst ()Ljava/util/Optional<TT;>;
  m count ()J
  m anyMatch (Ljava/util/function/Predicate<-TT;>;)Z
  m of <T:Ljava/lang/Object;>([TT;)Ljava/util/stream/Stream<TT;>; static varargs
"#;

/// Parse the built-in table into type declarations.
pub fn builtin_types() -> Vec<TypeDecl> {
    let mut types: Vec<TypeDecl> = Vec::new();
    for (line_no, line) in TABLE.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((head, rest)) = tokens.split_first() else {
            continue;
        };
        match *head {
            "class" | "interface" | "enum" | "annotation" => {
                if let Some(decl) = type_header(head, rest) {
                    types.push(decl);
                }
            }
            "f" | "m" => {
                let Some(owner) = types.last_mut() else {
                    continue;
                };
                if !member_line(owner, head, rest) {
                    tracing::warn!(line = line_no + 1, "bad built-in member line");
                }
            }
            _ => tracing::warn!(line = line_no + 1, "bad built-in table line"),
        }
    }
    types
}

/// Insert every built-in type into `index`.
pub fn install(index: &mut TypeIndex) {
    let mut links = Vec::new();
    for decl in builtin_types() {
        if let Some(outer) = &decl.outer {
            links.push((outer.clone(), decl.simple.clone(), decl.binary.clone()));
        }
        index.insert(decl);
    }
    for (outer, simple, inner) in links {
        index.add_member(&outer, &simple, &inner);
    }
}

fn type_header(keyword: &str, rest: &[&str]) -> Option<TypeDecl> {
    let (binary, clauses) = rest.split_first()?;
    let kind = match keyword {
        "interface" => TypeKind::Interface,
        "enum" => TypeKind::Enum,
        "annotation" => TypeKind::Annotation,
        _ => TypeKind::Class,
    };
    let mut decl = TypeDecl::new(*binary, kind, Origin::Builtin);
    decl.outer = binary.rsplit_once('$').map(|(outer, _)| outer.to_string());
    let mut iter = clauses.iter();
    while let Some(clause) = iter.next() {
        let value = iter.next()?;
        match *clause {
            "extends" if kind.is_interface() => decl.interfaces.push(value.to_string()),
            "extends" => decl.superclass = Some(value.to_string()),
            "implements" => decl
                .interfaces
                .extend(value.split(',').map(str::to_string)),
            "sig" => {
                let sig = parse_class_signature(value).ok()?;
                let superclass = (!kind.is_interface()).then_some(sig.superclass);
                decl.superclass = superclass.as_ref().and_then(JType::class_name).map(str::to_string);
                decl.interfaces = sig
                    .interfaces
                    .iter()
                    .filter_map(JType::class_name)
                    .map(str::to_string)
                    .collect();
                decl.type_params = sig.type_params;
                decl.generic_supers = superclass.into_iter().chain(sig.interfaces).collect();
            }
            _ => return None,
        }
    }
    if kind == TypeKind::Annotation {
        decl.interfaces
            .push("java.lang.annotation.Annotation".to_string());
    }
    if kind == TypeKind::Class && decl.superclass.is_none() && decl.binary != crate::model::OBJECT
    {
        decl.superclass = Some(crate::model::OBJECT.to_string());
    }
    Some(decl)
}

fn member_line(owner: &mut TypeDecl, kind: &str, rest: &[&str]) -> bool {
    let [name, desc, flags @ ..] = rest else {
        return false;
    };
    let is_static = flags.contains(&"static");
    if kind == "f" {
        let Ok(ty) = parse_field_signature(desc) else {
            return false;
        };
        let ty = ty.with_var_bounds(&owner.type_params);
        owner
            .fields
            .push(FieldDecl::new(*name, ty.erasure(), is_static).with_generic(ty));
    } else {
        let Ok(sig) = parse_method_signature(desc) else {
            return false;
        };
        let sig = sig.with_var_bounds(&owner.type_params);
        let mut method = MethodDecl::new(*name, sig.erasure()).with_generic(sig);
        method.is_static = is_static;
        method.is_varargs = flags.contains(&"varargs");
        method.is_abstract = owner.kind.is_interface() && !is_static && !flags.contains(&"default");
        owner.methods.push(method);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_parses_completely() {
        let types = builtin_types();
        assert!(types.len() > 40);
        let string = types
            .iter()
            .find(|t| t.binary == "java.lang.String")
            .unwrap();
        assert_eq!(string.superclass.as_deref(), Some("java.lang.Object"));
        assert!(string.interfaces.iter().any(|i| i == "java.lang.CharSequence"));
        let format = string.methods.iter().find(|m| m.name == "format").unwrap();
        assert!(format.is_static && format.is_varargs);
    }

    #[test]
    fn hierarchy_shapes() {
        let types = builtin_types();
        let get = |name: &str| types.iter().find(|t| t.binary == name).unwrap();
        assert_eq!(get(crate::model::OBJECT).superclass, None);
        assert_eq!(
            get("java.lang.RuntimeException").superclass.as_deref(),
            Some("java.lang.Exception")
        );
        assert_eq!(get("java.io.Closeable").interfaces, vec!["java.lang.AutoCloseable"]);
        assert_eq!(get("java.lang.Override").kind, TypeKind::Annotation);
    }

    #[test]
    fn collections_are_generic() {
        let types = builtin_types();
        let get = |name: &str| types.iter().find(|t| t.binary == name).unwrap();
        let list = get("java.util.List");
        assert_eq!(list.superclass, None);
        assert_eq!(list.interfaces, vec!["java.util.Collection"]);
        assert_eq!(list.type_params[0].name, "E");
        let item = list.methods.iter().find(|m| m.name == "get").unwrap();
        assert_eq!(item.desc.to_string(), "(I)Ljava/lang/Object;");
        assert_eq!(item.generic_ret().unwrap().to_string(), "E");
        assert!(item.is_abstract);

        let array_list = get("java.util.ArrayList");
        assert_eq!(array_list.superclass.as_deref(), Some("java.lang.Object"));
        assert_eq!(array_list.generic_supertypes()[1].to_string(), "java.util.List<E>");

        let iterable = get("java.lang.Iterable");
        let abstracts: Vec<&str> = iterable
            .methods
            .iter()
            .filter(|m| m.is_abstract)
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(abstracts, vec!["iterator"]);
        // erasure of a bounded variable
        let value_of = get("java.lang.Enum").methods.iter().find(|m| m.name == "valueOf").unwrap();
        assert_eq!(value_of.desc.to_string(), "(Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Enum;");
    }

    #[test]
    fn nested_builtins_are_member_types() {
        let mut index = TypeIndex::new();
        install(&mut index);
        assert_eq!(
            index.resolve_qualified(&["java", "util", "Map", "Entry"]).as_deref(),
            Some("java.util.Map$Entry")
        );
        assert_eq!(index.top_level("java.util", "Entry"), None);
    }
}
